pub mod engine;
pub mod state;

pub use engine::{
    ApplicationInfo, EngineSettings, GraphTraversalEngine, RunStatus, TraversalOutcome,
};
pub use state::{
    EnginePhase, FailedNavigation, LogEntry, LogLevel, ScreenshotRecord, TraversalState,
};

pub mod emitter;
pub mod screenshot_store;

pub use emitter::{NavigationReport, ReportEmitter, ReportSummary};
pub use screenshot_store::ScreenshotStore;

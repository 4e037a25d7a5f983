pub mod config;
pub mod controller;
pub mod coordinator;
pub mod detection;
pub mod error;
pub mod navigation;
pub mod regions;
pub mod report;
pub mod traversal;

pub use config::{Configuration, TimingConfig};
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use error::{
    ControllerError, DetectionFailure, LaunchFailure, MalformedMapError, NavigationError,
    NavigatorError, NoRegionResolvedError,
};
pub use navigation::{NavigationGraph, NavigationMap};
pub use report::NavigationReport;
pub use traversal::RunStatus;

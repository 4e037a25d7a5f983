pub mod graph;
pub mod map;

pub use graph::{NavigationGraph, SceneNode};
pub use map::{ClickHint, EdgeSource, NavigationEdge, NavigationMap};

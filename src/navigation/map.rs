use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::controller::MouseButton;
use crate::error::MalformedMapError;
use crate::navigation::graph::NavigationGraph;

/// Where an edge was found in the application's source data. Kept for
/// diagnostics only; traversal never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    #[default]
    SceneDefinition,
    PrefabReference,
}

/// Stored click position for an edge, as fractions of the window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickHint {
    pub x_pct: f32,
    pub y_pct: f32,
    #[serde(default)]
    pub button: MouseButton,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub source: EdgeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickHint>,
}

impl NavigationEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            source: EdgeSource::SceneDefinition,
            click: None,
        }
    }

    pub fn with_source(mut self, source: EdgeSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_click(mut self, click: ClickHint) -> Self {
        self.click = Some(click);
        self
    }
}

/// Serialized form of a navigation map, as read from disk.
///
/// Only `scenes` and `edges` are required. `start` names the scene assumed
/// when the first detection cannot identify where the application opened,
/// and `hub` names the scene reached through the back region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationMap {
    pub scenes: Vec<String>,
    pub edges: Vec<NavigationEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,
}

impl NavigationMap {
    pub fn from_json_str(json: &str) -> Result<Self, MalformedMapError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, MalformedMapError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MalformedMapError::Read(e, path.to_path_buf()))?;
        let map = Self::from_json_str(&contents)?;
        tracing::info!(
            "Loaded navigation map {} ({} scenes, {} edges)",
            path.display(),
            map.scenes.len(),
            map.edges.len()
        );
        Ok(map)
    }

    /// Validates the map and freezes it into a graph.
    pub fn into_graph(self) -> Result<NavigationGraph, MalformedMapError> {
        NavigationGraph::from_map(self)
    }
}

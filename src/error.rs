use std::path::PathBuf;

use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum NavigatorError {
    #[error("Navigation map error: {0}")]
    Map(#[from] MalformedMapError),
    #[error("Launch failure: {0}")]
    Launch(#[from] LaunchFailure),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to write report to {1}: {0}")]
    Report(std::io::Error, PathBuf),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to write screenshot {1}: {0}")]
    Artifact(image::ImageError, PathBuf),
    #[error("Traversal task failed: {0}")]
    Task(String),
    #[error("Coordinator setup incomplete: {0} not set")]
    Setup(&'static str),
}

// Load-time errors; a map that fails any of these never becomes a graph.
#[derive(Error, Debug)]
pub enum MalformedMapError {
    #[error("Failed to read navigation map {1}: {0}")]
    Read(std::io::Error, PathBuf),
    #[error("Navigation map is not valid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Navigation map declares no scenes")]
    NoScenes,
    #[error("Scene '{0}' is declared more than once")]
    DuplicateScene(String),
    #[error("Edge {from} -> {to} references undeclared scene '{missing}'")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },
    #[error("Start scene '{0}' is not declared")]
    UnknownStart(String),
    #[error("Hub scene '{0}' is not declared")]
    UnknownHub(String),
    #[error("Click hint on edge {from} -> {to} is outside the window ({x_pct}, {y_pct})")]
    ClickHintOutOfRange {
        from: String,
        to: String,
        x_pct: f32,
        y_pct: f32,
    },
}

#[derive(Error, Debug)]
pub enum LaunchFailure {
    #[error("Application could not be started: {0}")]
    Spawn(ControllerError),
    #[error("Window '{title_hint}' did not appear within {waited_ms} ms")]
    WindowTimeout { title_hint: String, waited_ms: u64 },
}

// Errors surfaced by an AppController implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(PathBuf),
    #[error("Process exited immediately: {0}")]
    ExitedImmediately(String),
    #[error("No application window is available")]
    NoWindow,
    #[error("Input synthesis failed: {0}")]
    Input(String),
    #[error("Screen capture failed: {0}")]
    Capture(String),
    #[error("Failed to close application: {0}")]
    Close(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionFailure {
    #[error("OCR engine failed: {0}")]
    Ocr(String),
    #[error("OCR engine did not answer within {0} ms")]
    Timeout(u64),
    #[error("Capture for detection failed: {0}")]
    Capture(#[from] ControllerError),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("No click region for {from} -> {to}: {reason}")]
pub struct NoRegionResolvedError {
    pub from: String,
    pub to: String,
    pub reason: String,
}

// Per-edge errors; recorded in the failure list, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    #[error("Expected scene '{expected}' after {attempts} attempts, last saw {last_seen}")]
    Timeout {
        expected: String,
        attempts: u32,
        last_seen: String,
    },
    #[error(transparent)]
    NoRegion(#[from] NoRegionResolvedError),
}

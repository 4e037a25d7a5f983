use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Detecting,
    Capturing,
    Navigating,
    Backtracking,
    Done,
    Aborted,
    Cancelled,
}

impl EnginePhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EnginePhase::Done | EnginePhase::Aborted | EnginePhase::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenshotRecord {
    pub scene: String,
    pub filename: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedNavigation {
    pub from: String,
    pub to: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Everything one traversal run accumulates. Created fresh per run and
/// handed to the report emitter when the run ends.
#[derive(Debug)]
pub struct TraversalState {
    visited: IndexSet<String>,
    queue: VecDeque<String>,
    screenshots: Vec<ScreenshotRecord>,
    failed_navigations: Vec<FailedNavigation>,
    log: Vec<LogEntry>,
    phase: EnginePhase,
    position: Option<String>,
}

impl Default for TraversalState {
    fn default() -> Self {
        Self::new()
    }
}

impl TraversalState {
    pub fn new() -> Self {
        Self {
            visited: IndexSet::new(),
            queue: VecDeque::new(),
            screenshots: Vec::new(),
            failed_navigations: Vec::new(),
            log: Vec::new(),
            phase: EnginePhase::Idle,
            position: None,
        }
    }

    /// Returns false when the scene was already visited.
    pub fn mark_visited(&mut self, scene: &str) -> bool {
        self.visited.insert(scene.to_string())
    }

    pub fn is_visited(&self, scene: &str) -> bool {
        self.visited.contains(scene)
    }

    /// Visited scenes in visit order.
    pub fn visited(&self) -> impl Iterator<Item = &String> {
        self.visited.iter()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Appends to the BFS frontier unless the scene is already queued.
    pub fn enqueue(&mut self, scene: &str) -> bool {
        if self.queue.iter().any(|queued| queued == scene) {
            return false;
        }
        self.queue.push_back(scene.to_string());
        true
    }

    pub fn dequeue(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns false, and records nothing, for a scene already captured.
    pub fn record_screenshot(&mut self, record: ScreenshotRecord) -> bool {
        if self.screenshots.iter().any(|s| s.scene == record.scene) {
            return false;
        }
        self.screenshots.push(record);
        true
    }

    pub fn screenshots(&self) -> &[ScreenshotRecord] {
        &self.screenshots
    }

    /// Keeps one entry per (from, to); a repeated failure overwrites the
    /// attempt count and error of the existing entry.
    pub fn record_failure(&mut self, failure: FailedNavigation) {
        match self
            .failed_navigations
            .iter_mut()
            .find(|f| f.from == failure.from && f.to == failure.to)
        {
            Some(existing) => {
                existing.attempts = failure.attempts;
                existing.last_error = failure.last_error;
            }
            None => self.failed_navigations.push(failure),
        }
    }

    pub fn failed_navigations(&self) -> &[FailedNavigation] {
        &self.failed_navigations
    }

    /// Appends to the run log and mirrors the message to `tracing`.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: EnginePhase) {
        if self.phase != phase {
            tracing::debug!("Engine phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Last scene the detector identified; `None` after an unknown result.
    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    pub fn set_position(&mut self, position: Option<String>) {
        self.position = position;
    }
}

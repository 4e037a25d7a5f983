use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::NavigatorError;
use crate::navigation::{NavigationGraph, SceneNode};
use crate::traversal::{
    ApplicationInfo, EnginePhase, FailedNavigation, LogEntry, RunStatus, ScreenshotRecord,
    TraversalOutcome,
};

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_scenes: usize,
    /// Scenes the graph can reach from where the run started.
    pub reachable_scenes: usize,
    pub visited_scenes: usize,
    pub screenshots_captured: usize,
    pub failed_navigations: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub final_phase: EnginePhase,
    pub application: ApplicationInfo,
    pub summary: ReportSummary,
    pub visited_scenes: Vec<String>,
    pub unvisited_scenes: Vec<String>,
    pub scenes: Vec<SceneNode>,
    pub screenshots: Vec<ScreenshotRecord>,
    pub failed_navigations: Vec<FailedNavigation>,
    pub navigation_log: Vec<LogEntry>,
}

pub struct ReportEmitter;

impl ReportEmitter {
    /// Builds the report from a finished (or interrupted) run.
    pub fn assemble(outcome: &TraversalOutcome, graph: &NavigationGraph) -> NavigationReport {
        let state = &outcome.state;
        let visited_scenes: Vec<String> = state.visited().cloned().collect();
        let unvisited_scenes: Vec<String> = graph
            .scenes()
            .filter(|scene| !state.is_visited(scene))
            .cloned()
            .collect();
        let origin = visited_scenes
            .first()
            .map(String::as_str)
            .unwrap_or(graph.start());
        let total_scenes = graph.scene_count();

        let summary = ReportSummary {
            total_scenes,
            reachable_scenes: graph.reachable_from(origin).len(),
            visited_scenes: visited_scenes.len(),
            screenshots_captured: state.screenshots().len(),
            failed_navigations: state.failed_navigations().len(),
            completion_rate: completion_rate(visited_scenes.len(), total_scenes),
        };

        NavigationReport {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status: outcome.status.clone(),
            final_phase: state.phase(),
            application: outcome.application.clone(),
            summary,
            scenes: graph.nodes(&|scene| state.is_visited(scene)),
            visited_scenes,
            unvisited_scenes,
            screenshots: state.screenshots().to_vec(),
            failed_navigations: state.failed_navigations().to_vec(),
            navigation_log: state.log_entries().to_vec(),
        }
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn emit(report: &NavigationReport, path: &Path) -> Result<(), NavigatorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| NavigatorError::Report(e, parent.to_path_buf()))?;
            }
        }
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(path, json).map_err(|e| NavigatorError::Report(e, path.to_path_buf()))?;
        tracing::info!("Report saved: {}", path.display());
        Ok(())
    }

    pub fn log_summary(report: &NavigationReport) {
        let summary = &report.summary;
        tracing::info!(
            "Visited {}/{} scenes ({} reachable), completion {:.1}%",
            summary.visited_scenes,
            summary.total_scenes,
            summary.reachable_scenes,
            summary.completion_rate * 100.0
        );
        tracing::info!(
            "Screenshots captured: {}, failed navigations: {}",
            summary.screenshots_captured,
            summary.failed_navigations
        );
        for failure in &report.failed_navigations {
            tracing::warn!(
                "  {} -> {} failed after {} attempts: {}",
                failure.from,
                failure.to,
                failure.attempts,
                failure.last_error
            );
        }
        if !report.unvisited_scenes.is_empty() {
            tracing::warn!("Unvisited scenes: {}", report.unvisited_scenes.join(", "));
        }
    }
}

fn completion_rate(visited: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (visited as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{NavigationEdge, NavigationMap};
    use crate::traversal::{LogLevel, TraversalState};

    fn graph() -> NavigationGraph {
        NavigationMap {
            scenes: vec!["A".into(), "B".into(), "C".into(), "Island".into()],
            edges: vec![NavigationEdge::new("A", "B"), NavigationEdge::new("B", "C")],
            start: None,
            hub: None,
        }
        .into_graph()
        .unwrap()
    }

    fn outcome() -> TraversalOutcome {
        let mut state = TraversalState::new();
        state.mark_visited("A");
        state.mark_visited("B");
        state.record_failure(FailedNavigation {
            from: "B".into(),
            to: "C".into(),
            attempts: 3,
            last_error: "timeout".into(),
        });
        state.log(LogLevel::Info, "done");
        TraversalOutcome {
            status: RunStatus::Completed,
            state,
            application: ApplicationInfo::default(),
        }
    }

    #[test]
    fn test_completion_rate_bounds() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 2), 0.5);
        assert_eq!(completion_rate(4, 4), 1.0);
    }

    #[test]
    fn test_assemble_distinguishes_visited_from_reachable() {
        let g = graph();
        let report = ReportEmitter::assemble(&outcome(), &g);
        assert_eq!(report.summary.total_scenes, 4);
        assert_eq!(report.summary.reachable_scenes, 3);
        assert_eq!(report.summary.visited_scenes, 2);
        assert_eq!(report.summary.failed_navigations, 1);
        assert_eq!(report.summary.completion_rate, 0.5);
        assert_eq!(report.visited_scenes, vec!["A", "B"]);
        assert_eq!(report.unvisited_scenes, vec!["C", "Island"]);
        assert!(report.scenes[0].visited);
        assert!(!report.scenes[3].visited);
        assert_eq!(report.navigation_log.len(), 1);
    }

    #[test]
    fn test_emit_writes_json() {
        let g = graph();
        let report = ReportEmitter::assemble(&outcome(), &g);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        ReportEmitter::emit(&report, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["completion_rate"], 0.5);
        assert_eq!(written["status"]["state"], "completed");
        assert_eq!(written["final_phase"], "idle");
        assert_eq!(written["failed_navigations"][0]["attempts"], 3);
        assert_eq!(written["navigation_log"][0]["level"], "info");
    }
}

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Configuration,
    controller::AppController,
    detection::{SceneDetector, TextExtractor},
    error::NavigatorError,
    navigation::{NavigationGraph, NavigationMap},
    regions::{ClickRegionResolver, HeuristicRegionResolver},
    report::{NavigationReport, ReportEmitter, ScreenshotStore},
    traversal::{EngineSettings, GraphTraversalEngine, TraversalOutcome},
};

/// Owns one traversal run: the engine task, its cancellation token and the
/// report written when the task ends.
pub struct Coordinator {
    configuration: Configuration,
    graph: Arc<NavigationGraph>,
    traversal_task: Option<JoinHandle<TraversalOutcome>>,
    cancel_token: CancellationToken,
}

impl Coordinator {
    fn new(
        configuration: Configuration,
        graph: Arc<NavigationGraph>,
        engine: GraphTraversalEngine,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            configuration,
            graph,
            traversal_task: Some(tokio::spawn(engine.run())),
            cancel_token,
        }
    }

    pub fn builder(configuration: Configuration) -> CoordinatorBuilder {
        CoordinatorBuilder::new(configuration)
    }

    /// Token that interrupts the run; cancelling it still produces a report.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Waits for the traversal, cancelling it on Ctrl-C, then writes the
    /// report for whatever state the run reached.
    pub async fn run(mut self) -> Result<NavigationReport, NavigatorError> {
        let mut task = self
            .traversal_task
            .take()
            .ok_or(NavigatorError::Task("traversal already awaited".to_string()))?;

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = interrupted(tokio::signal::ctrl_c()) => {
                tracing::warn!("Interrupt received, stopping traversal");
                self.cancel_token.cancel();
                task.await
            }
        };
        let outcome = joined.map_err(|e| NavigatorError::Task(e.to_string()))?;

        let report = ReportEmitter::assemble(&outcome, &self.graph);
        ReportEmitter::emit(&report, &self.configuration.report_path())?;
        ReportEmitter::log_summary(&report);
        Ok(report)
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

// Resolves on Ctrl-C; never resolves when the handler cannot be installed.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::warn!("Ctrl-C handler unavailable, run is not interruptible: {}", e);
        std::future::pending::<()>().await;
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
    graph: Option<NavigationGraph>,
    controller: Option<Arc<dyn AppController>>,
    text_extractor: Option<Box<dyn TextExtractor>>,
    resolver: Option<Arc<dyn ClickRegionResolver>>,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            graph: None,
            controller: None,
            text_extractor: None,
            resolver: None,
        }
    }

    // Sets the application path, this will override the default configuration.
    pub fn app_path(mut self, app_path: impl Into<PathBuf>) -> Self {
        self.configuration.app_path = app_path.into();
        self
    }

    // Sets the navigation map path, ignored when a graph is supplied.
    pub fn map_path(mut self, map_path: impl Into<PathBuf>) -> Self {
        self.configuration.map_path = map_path.into();
        self
    }

    // Sets the directory for the report and screenshots.
    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.configuration.output_dir = output_dir.into();
        self
    }

    pub fn window_title_hint(mut self, hint: impl Into<String>) -> Self {
        self.configuration.window_title_hint = hint.into();
        self
    }

    pub fn retry_bound(mut self, retry_bound: u32) -> Self {
        self.configuration.retry_bound = retry_bound;
        self
    }

    pub fn graph(mut self, graph: NavigationGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn controller(mut self, controller: Arc<dyn AppController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn text_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.text_extractor = Some(extractor);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ClickRegionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Loads the map from `map_path` unless a graph was supplied, then
    /// starts the traversal task.
    pub fn build(self) -> Result<Coordinator, NavigatorError> {
        let controller = self.controller.ok_or(NavigatorError::Setup("controller"))?;
        let extractor = self
            .text_extractor
            .ok_or(NavigatorError::Setup("text extractor"))?;
        let graph = match self.graph {
            Some(graph) => graph,
            None => NavigationMap::load(&self.configuration.map_path)?.into_graph()?,
        };
        let graph = Arc::new(graph);
        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(HeuristicRegionResolver::new(
                self.configuration.regions.clone(),
            ))
        });

        let detector = SceneDetector::new(
            graph.scenes().cloned().collect::<Vec<_>>(),
            extractor,
            self.configuration.detection.clone(),
        );
        let cancel_token = CancellationToken::new();
        let engine = GraphTraversalEngine::new(
            Arc::clone(&graph),
            controller,
            detector,
            resolver,
            ScreenshotStore::new(self.configuration.screenshot_path()),
            EngineSettings::from(&self.configuration),
            cancel_token.clone(),
        );
        Ok(Coordinator::new(
            self.configuration,
            graph,
            engine,
            cancel_token,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::controller::SimulatedApplication;
    use crate::detection::SimulatedOcr;
    use crate::navigation::NavigationEdge;
    use crate::traversal::RunStatus;

    fn map() -> NavigationMap {
        NavigationMap {
            scenes: vec!["Hub".into(), "Lab".into(), "Office".into()],
            edges: vec![
                NavigationEdge::new("Hub", "Lab"),
                NavigationEdge::new("Hub", "Office"),
            ],
            start: None,
            hub: None,
        }
    }

    fn configuration(output: &std::path::Path) -> Configuration {
        Configuration {
            app_path: PathBuf::from("career.exe"),
            output_dir: output.to_path_buf(),
            timing: TimingConfig::immediate(),
            ..Configuration::default()
        }
    }

    fn builder(output: &std::path::Path) -> CoordinatorBuilder {
        let graph = map().into_graph().unwrap();
        let app = SimulatedApplication::builder(graph.clone()).build();
        let scenes = graph.scenes().cloned().collect();
        CoordinatorBuilder::new(configuration(output))
            .graph(graph)
            .controller(Arc::new(app))
            .text_extractor(Box::new(SimulatedOcr::new(scenes)))
    }

    #[tokio::test]
    async fn test_coordinator_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = builder(dir.path())
            .build()
            .expect("Failed to build coordinator")
            .run()
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.visited_scenes, vec!["Hub", "Lab", "Office"]);
        assert_eq!(report.summary.completion_rate, 1.0);
        assert!(dir.path().join("navigation_report.json").exists());
        assert!(dir.path().join("screenshots").join("Lab.png").exists());
    }

    #[tokio::test]
    async fn test_stopped_coordinator_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = builder(dir.path()).build().unwrap();
        coordinator.stop();
        let report = coordinator.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.visited_scenes.is_empty());
        assert!(dir.path().join("navigation_report.json").exists());
    }

    #[tokio::test]
    async fn test_builder_loads_map_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let map_path = dir.path().join("map.json");
        std::fs::write(
            &map_path,
            r#"{"scenes": ["Hub", "Lab"], "edges": [{"from": "Hub", "to": "Lab"}]}"#,
        )
        .unwrap();
        let graph = NavigationMap::load(&map_path).unwrap().into_graph().unwrap();
        let app = SimulatedApplication::builder(graph).build();

        let report = CoordinatorBuilder::new(configuration(dir.path()))
            .map_path(&map_path)
            .controller(Arc::new(app))
            .text_extractor(Box::new(SimulatedOcr::new(vec![
                "Hub".to_string(),
                "Lab".to_string(),
            ])))
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(report.summary.total_scenes, 2);
        assert_eq!(report.summary.visited_scenes, 2);
    }

    #[tokio::test]
    async fn test_unavailable_signal_handler_never_interrupts() {
        let failing = async { Err(std::io::Error::other("no signal support")) };
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), interrupted(failing)).await;
        assert!(waited.is_err());

        let delivered = async { Ok(()) };
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), interrupted(delivered))
                .await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_build_requires_controller() {
        let dir = tempfile::tempdir().unwrap();
        let result = CoordinatorBuilder::new(configuration(dir.path()))
            .graph(map().into_graph().unwrap())
            .text_extractor(Box::new(SimulatedOcr::new(vec![])))
            .build();
        assert!(matches!(result, Err(NavigatorError::Setup("controller"))));
    }
}

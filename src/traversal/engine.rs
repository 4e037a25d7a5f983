use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{Configuration, TimingConfig};
use crate::controller::{AppController, Screenshot, WindowHandle};
use crate::detection::{DetectedScene, SceneDetectionResult, SceneDetector};
use crate::error::{
    ControllerError, DetectionFailure, LaunchFailure, NavigationError, NoRegionResolvedError,
};
use crate::navigation::{NavigationEdge, NavigationGraph};
use crate::regions::{ClickPoint, ClickRegionResolver};
use crate::report::ScreenshotStore;
use crate::traversal::state::{EnginePhase, FailedNavigation, LogLevel, TraversalState};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplicationInfo {
    pub path: PathBuf,
    pub window_title_hint: String,
    pub pid: Option<u32>,
    pub launch_time_ms: Option<u64>,
}

pub struct TraversalOutcome {
    pub status: RunStatus,
    pub state: TraversalState,
    pub application: ApplicationInfo,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub app_path: PathBuf,
    pub window_title_hint: String,
    pub retry_bound: u32,
    pub timing: TimingConfig,
}

impl From<&Configuration> for EngineSettings {
    fn from(configuration: &Configuration) -> Self {
        Self {
            app_path: configuration.app_path.clone(),
            window_title_hint: configuration.effective_title_hint(),
            retry_bound: configuration.retry_bound,
            timing: configuration.timing.clone(),
        }
    }
}

// Reasons the run stops before the queue is exhausted.
enum Halt {
    Cancelled,
    Launch(LaunchFailure),
}

struct Observation {
    detection: SceneDetectionResult,
    screenshot: Option<Screenshot>,
}

/// Races a collaborator call against cancellation.
async fn guarded<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output, Halt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Halt::Cancelled),
        output = future => Ok(output),
    }
}

/// Breadth-first traversal of the navigation graph against a live
/// application.
///
/// The engine issues one collaborator call at a time. Each detection is
/// focus, settle, capture, OCR, in that order: capturing without focus
/// returns whatever window happens to be on top. Individual edge failures
/// are recorded and skipped; only a failed launch or cancellation ends the
/// run early.
pub struct GraphTraversalEngine {
    graph: Arc<NavigationGraph>,
    controller: Arc<dyn AppController>,
    detector: SceneDetector,
    resolver: Arc<dyn ClickRegionResolver>,
    screenshots: ScreenshotStore,
    settings: EngineSettings,
    cancel: CancellationToken,
    state: TraversalState,
    application: ApplicationInfo,
    window: Option<WindowHandle>,
}

impl GraphTraversalEngine {
    pub fn new(
        graph: Arc<NavigationGraph>,
        controller: Arc<dyn AppController>,
        detector: SceneDetector,
        resolver: Arc<dyn ClickRegionResolver>,
        screenshots: ScreenshotStore,
        settings: EngineSettings,
        cancel: CancellationToken,
    ) -> Self {
        let application = ApplicationInfo {
            path: settings.app_path.clone(),
            window_title_hint: settings.window_title_hint.clone(),
            ..ApplicationInfo::default()
        };
        Self {
            graph,
            controller,
            detector,
            resolver,
            screenshots,
            settings,
            cancel,
            state: TraversalState::new(),
            application,
            window: None,
        }
    }

    fn retry_bound(&self) -> u32 {
        self.settings.retry_bound.max(1)
    }

    pub async fn run(mut self) -> TraversalOutcome {
        self.state.log(
            LogLevel::Info,
            format!(
                "Starting traversal of {} scenes and {} edges using {} and {}",
                self.graph.scene_count(),
                self.graph.edge_count(),
                self.controller.name(),
                self.resolver.name()
            ),
        );

        let status = match self.drive().await {
            Ok(()) => {
                self.state.set_phase(EnginePhase::Done);
                self.state.log(
                    LogLevel::Info,
                    format!(
                        "Traversal finished: {}/{} scenes visited, {} failed navigations",
                        self.state.visited_count(),
                        self.graph.scene_count(),
                        self.state.failed_navigations().len()
                    ),
                );
                RunStatus::Completed
            }
            Err(Halt::Cancelled) => {
                self.state.set_phase(EnginePhase::Cancelled);
                self.state
                    .log(LogLevel::Warn, "Traversal cancelled by operator");
                RunStatus::Cancelled
            }
            Err(Halt::Launch(failure)) => {
                self.state.set_phase(EnginePhase::Aborted);
                let reason = failure.to_string();
                self.state
                    .log(LogLevel::Error, format!("Traversal aborted: {}", reason));
                RunStatus::Aborted { reason }
            }
        };

        self.shutdown().await;

        TraversalOutcome {
            status,
            state: self.state,
            application: self.application,
        }
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        self.launch().await?;
        self.detect_initial_scene().await?;

        let graph = Arc::clone(&self.graph);
        while let Some(current) = self.state.dequeue() {
            self.state.set_phase(EnginePhase::Navigating);
            self.explore(&graph, &current).await?;
        }
        Ok(())
    }

    async fn launch(&mut self) -> Result<(), Halt> {
        let started = Instant::now();
        let pid = guarded(
            &self.cancel,
            self.controller.launch(&self.settings.app_path),
        )
        .await?
        .map_err(|e| Halt::Launch(LaunchFailure::Spawn(e)))?;
        self.application.pid = Some(pid);
        self.state.log(
            LogLevel::Info,
            format!(
                "Launched {} (pid {})",
                self.settings.app_path.display(),
                pid
            ),
        );

        self.settle(self.settings.timing.launch_settle()).await?;

        let title_hint = self.settings.window_title_hint.clone();
        for _ in 0..self.settings.timing.window_poll_attempts() {
            if let Some(window) =
                guarded(&self.cancel, self.controller.detect_window(&title_hint)).await?
            {
                let elapsed = started.elapsed().as_millis() as u64;
                self.window = Some(window);
                self.application.launch_time_ms = Some(elapsed);
                self.state.log(
                    LogLevel::Info,
                    format!("Window '{}' found after {} ms", title_hint, elapsed),
                );
                return Ok(());
            }
            self.settle(self.settings.timing.window_poll()).await?;
        }

        Err(Halt::Launch(LaunchFailure::WindowTimeout {
            title_hint,
            waited_ms: self.settings.timing.window_timeout_ms,
        }))
    }

    async fn shutdown(&mut self) {
        if self.window.is_none() && self.application.pid.is_some() {
            // Launched but never found: one last look before giving up on it.
            let title_hint = self.settings.window_title_hint.clone();
            self.window =
                tokio::time::timeout(CLOSE_TIMEOUT, self.controller.detect_window(&title_hint))
                    .await
                    .ok()
                    .flatten();
        }
        let Some(window) = self.window.take() else {
            if self.application.pid.is_some() {
                self.state.log(
                    LogLevel::Warn,
                    "Application window was never found; it may need to be closed manually",
                );
            }
            return;
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, self.controller.close(window)).await {
            Ok(Ok(())) => self.state.log(LogLevel::Info, "Application closed"),
            Ok(Err(e)) => self
                .state
                .log(LogLevel::Error, format!("Failed to close application: {}", e)),
            Err(_) => self.state.log(
                LogLevel::Error,
                format!(
                    "Application did not close within {} s",
                    CLOSE_TIMEOUT.as_secs()
                ),
            ),
        }
    }

    async fn settle(&self, duration: Duration) -> Result<(), Halt> {
        guarded(&self.cancel, self.controller.sleep(duration)).await
    }

    fn window(&self) -> Result<WindowHandle, Halt> {
        self.window
            .ok_or(Halt::Launch(LaunchFailure::Spawn(ControllerError::NoWindow)))
    }

    /// Focus, settle, capture, detect. Capture and OCR failures degrade to
    /// an unknown scene.
    async fn observe(&mut self) -> Result<Observation, Halt> {
        let window = self.window()?;
        if let Err(e) = guarded(&self.cancel, self.controller.focus(window)).await? {
            self.state
                .log(LogLevel::Warn, format!("Could not focus window: {}", e));
        }
        self.settle(self.settings.timing.focus_settle()).await?;

        let screenshot = match guarded(&self.cancel, self.controller.capture_screenshot()).await? {
            Ok(screenshot) => screenshot,
            Err(e) => {
                let failure = DetectionFailure::from(e);
                self.state.log(
                    LogLevel::Warn,
                    format!("{}; treating scene as unknown", failure),
                );
                self.state.set_position(None);
                return Ok(Observation {
                    detection: SceneDetectionResult::unknown(""),
                    screenshot: None,
                });
            }
        };

        let detection = match guarded(&self.cancel, self.detector.detect(&screenshot)).await? {
            Ok(detection) => detection,
            Err(failure) => {
                self.state.log(
                    LogLevel::Warn,
                    format!("{}; treating scene as unknown", failure),
                );
                SceneDetectionResult::unknown("")
            }
        };
        self.state
            .set_position(detection.scene.as_known().map(str::to_string));

        Ok(Observation {
            detection,
            screenshot: Some(screenshot),
        })
    }

    async fn detect_initial_scene(&mut self) -> Result<(), Halt> {
        self.state.set_phase(EnginePhase::Detecting);
        let mut last_screenshot = None;
        for attempt in 1..=self.retry_bound() {
            let observation = self.observe().await?;
            if let DetectedScene::Known(scene) = &observation.detection.scene {
                self.state.log(
                    LogLevel::Info,
                    format!(
                        "Initial scene is '{}' (confidence {:.2})",
                        scene, observation.detection.confidence
                    ),
                );
                let scene = scene.clone();
                self.arrive(&scene, observation.screenshot.as_ref());
                return Ok(());
            }
            self.state.log(
                LogLevel::Warn,
                format!(
                    "Initial scene not recognised (attempt {}/{}), OCR read {:?}",
                    attempt,
                    self.retry_bound(),
                    observation.detection.raw_text
                ),
            );
            if observation.screenshot.is_some() {
                last_screenshot = observation.screenshot;
            }
        }

        let start = self.graph.start().to_string();
        self.state.log(
            LogLevel::Warn,
            format!("Assuming the application opened on '{}'", start),
        );
        self.state.set_position(Some(start.clone()));
        self.arrive(&start, last_screenshot.as_ref());
        Ok(())
    }

    /// Stores the scene's capture, then marks it visited and queues it. A
    /// scene whose capture cannot be stored stays unvisited; a later arrival
    /// tries again. Arriving at an already visited scene is a suppressed
    /// revisit.
    fn arrive(&mut self, scene: &str, screenshot: Option<&Screenshot>) {
        if self.state.is_visited(scene) {
            self.state
                .log(LogLevel::Debug, format!("Revisit of '{}' suppressed", scene));
            return;
        }

        self.state.set_phase(EnginePhase::Capturing);
        let Some(screenshot) = screenshot else {
            self.state.log(
                LogLevel::Error,
                format!("No capture available for '{}'; left unvisited", scene),
            );
            return;
        };
        let record = match self.screenshots.store(scene, screenshot) {
            Ok(record) => record,
            Err(e) => {
                self.state.log(
                    LogLevel::Error,
                    format!("{}; '{}' left unvisited", e, scene),
                );
                return;
            }
        };

        self.state.mark_visited(scene);
        self.state.record_screenshot(record);
        self.state.enqueue(scene);
        self.state.log(
            LogLevel::Info,
            format!(
                "Visited '{}' ({}/{})",
                scene,
                self.state.visited_count(),
                self.graph.scene_count()
            ),
        );
    }

    fn has_unvisited_neighbours(&self, scene: &str) -> bool {
        self.graph
            .edges_from(scene)
            .iter()
            .any(|edge| !self.state.is_visited(&edge.to))
    }

    async fn explore(&mut self, graph: &NavigationGraph, current: &str) -> Result<(), Halt> {
        if !self.has_unvisited_neighbours(current) {
            self.state.log(
                LogLevel::Debug,
                format!("'{}' has no unvisited neighbours", current),
            );
            return Ok(());
        }

        for edge in graph.edges_from(current) {
            // Targets reached through an earlier edge are never re-queued.
            if self.state.is_visited(&edge.to) {
                continue;
            }
            if !self.reposition(graph, current).await? {
                self.state.log(
                    LogLevel::Warn,
                    format!(
                        "Could not get back to '{}'; skipping its remaining edges",
                        current
                    ),
                );
                break;
            }
            self.state.set_phase(EnginePhase::Navigating);
            self.traverse_edge(graph, edge).await?;
        }
        Ok(())
    }

    async fn resolve(
        &self,
        edge: &NavigationEdge,
    ) -> Result<Result<ClickPoint, NoRegionResolvedError>, Halt> {
        let window = self.window()?;
        let bounds = match guarded(&self.cancel, self.controller.window_bounds(window)).await? {
            Ok(bounds) => bounds,
            Err(e) => {
                return Ok(Err(NoRegionResolvedError {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    reason: format!("window bounds unavailable: {}", e),
                }))
            }
        };
        Ok(self.resolver.resolve(&self.graph, edge, bounds))
    }

    async fn click(&mut self, point: ClickPoint) -> Result<Result<(), ControllerError>, Halt> {
        let result = guarded(
            &self.cancel,
            self.controller.click(point.x, point.y, point.button),
        )
        .await?;
        if result.is_ok() {
            self.settle(self.settings.timing.navigation_settle()).await?;
        }
        Ok(result)
    }

    /// Attempts one edge up to the retry bound, recording a failure when
    /// the target never shows up.
    async fn traverse_edge(
        &mut self,
        graph: &NavigationGraph,
        edge: &NavigationEdge,
    ) -> Result<(), Halt> {
        let retry_bound = self.retry_bound();
        let mut last_seen = DetectedScene::Unknown.to_string();

        for attempt in 1..=retry_bound {
            if attempt > 1 {
                // Landed somewhere else: best effort to stand on the source
                // again before the next click.
                let elsewhere = self
                    .state
                    .position()
                    .is_some_and(|position| position != edge.from);
                if elsewhere {
                    self.reposition(graph, &edge.from).await?;
                }
            }

            let point = match self.resolve(edge).await? {
                Ok(point) => point,
                Err(e) => {
                    self.fail_edge(edge, retry_bound, NavigationError::NoRegion(e));
                    return Ok(());
                }
            };

            self.state.log(
                LogLevel::Debug,
                format!(
                    "Clicking ({}, {}) for {} -> {} (attempt {}/{})",
                    point.x, point.y, edge.from, edge.to, attempt, retry_bound
                ),
            );
            if let Err(e) = self.click(point).await? {
                last_seen = format!("click failed: {}", e);
                self.state.log(LogLevel::Warn, last_seen.clone());
                continue;
            }

            self.state.set_phase(EnginePhase::Detecting);
            let observation = self.observe().await?;
            if observation.detection.scene.is(&edge.to) {
                self.state.log(
                    LogLevel::Info,
                    format!(
                        "Reached '{}' from '{}' on attempt {}",
                        edge.to, edge.from, attempt
                    ),
                );
                self.arrive(&edge.to, observation.screenshot.as_ref());
                self.backtrack_if_dead_end(graph, &edge.to).await?;
                return Ok(());
            }

            last_seen = observation.detection.scene.to_string();
            self.state.log(
                LogLevel::Warn,
                format!(
                    "Expected '{}' but detected {} (attempt {}/{})",
                    edge.to, last_seen, attempt, retry_bound
                ),
            );
        }

        self.fail_edge(
            edge,
            retry_bound,
            NavigationError::Timeout {
                expected: edge.to.clone(),
                attempts: retry_bound,
                last_seen,
            },
        );
        Ok(())
    }

    fn fail_edge(&mut self, edge: &NavigationEdge, attempts: u32, error: NavigationError) {
        self.state.log(
            LogLevel::Error,
            format!("Navigation {} -> {} failed: {}", edge.from, edge.to, error),
        );
        self.state.record_failure(FailedNavigation {
            from: edge.from.clone(),
            to: edge.to.clone(),
            attempts,
            last_error: error.to_string(),
        });
    }

    /// Hub-and-spoke applications have no edges between spokes, so after
    /// reaching a dead end the engine goes back to the hub first.
    async fn backtrack_if_dead_end(
        &mut self,
        graph: &NavigationGraph,
        scene: &str,
    ) -> Result<(), Halt> {
        let Some(hub) = graph.hub() else {
            return Ok(());
        };
        if scene == hub
            || self.has_unvisited_neighbours(scene)
            || self.state.visited_count() == graph.scene_count()
        {
            return Ok(());
        }
        self.state.log(
            LogLevel::Debug,
            format!("'{}' is a dead end; returning to hub '{}'", scene, hub),
        );
        self.return_to_hub(graph).await?;
        Ok(())
    }

    /// Clicks the back region until the hub is detected.
    async fn return_to_hub(&mut self, graph: &NavigationGraph) -> Result<bool, Halt> {
        let Some(hub) = graph.hub() else {
            return Ok(false);
        };
        self.state.set_phase(EnginePhase::Backtracking);
        let window = self.window()?;

        for attempt in 1..=self.retry_bound() {
            let bounds = match guarded(&self.cancel, self.controller.window_bounds(window)).await? {
                Ok(bounds) => bounds,
                Err(e) => {
                    self.state.log(
                        LogLevel::Warn,
                        format!("Window bounds unavailable for back navigation: {}", e),
                    );
                    return Ok(false);
                }
            };
            let point = match self.resolver.resolve_back(bounds) {
                Ok(point) => point,
                Err(e) => {
                    self.state.log(LogLevel::Warn, e.to_string());
                    return Ok(false);
                }
            };
            if let Err(e) = self.click(point).await? {
                self.state
                    .log(LogLevel::Warn, format!("Back click failed: {}", e));
                continue;
            }
            let observation = self.observe().await?;
            if observation.detection.scene.is(hub) {
                self.state.log(
                    LogLevel::Debug,
                    format!("Returned to hub '{}' on attempt {}", hub, attempt),
                );
                self.arrive(hub, observation.screenshot.as_ref());
                return Ok(true);
            }
        }

        self.state.log(
            LogLevel::Warn,
            format!("Could not return to hub '{}'", hub),
        );
        Ok(false)
    }

    /// Gets the application onto `target`: shortest known path from the
    /// current position, else via the hub. Returns false if neither works.
    async fn reposition(&mut self, graph: &NavigationGraph, target: &str) -> Result<bool, Halt> {
        if self.state.position() == Some(target) {
            return Ok(true);
        }

        let previous_phase = self.state.phase();
        self.state.set_phase(EnginePhase::Backtracking);
        let reached = self.reposition_inner(graph, target).await?;
        self.state.set_phase(previous_phase);
        Ok(reached)
    }

    async fn reposition_inner(
        &mut self,
        graph: &NavigationGraph,
        target: &str,
    ) -> Result<bool, Halt> {
        // Paths only step on visited scenes so repositioning never jumps the
        // BFS queue.
        if let Some(position) = self.state.position().map(str::to_string) {
            let path = graph.shortest_path_through(&position, target, &|scene| {
                self.state.is_visited(scene)
            });
            if let Some(path) = path {
                if self.replay(&path).await? {
                    return Ok(true);
                }
            }
        }

        let Some(hub) = graph.hub() else {
            return Ok(false);
        };
        let at_hub = self.state.position() == Some(hub);
        if !at_hub && !self.return_to_hub(graph).await? {
            return Ok(false);
        }
        if hub == target {
            return Ok(true);
        }
        let path =
            graph.shortest_path_through(hub, target, &|scene| self.state.is_visited(scene));
        match path {
            Some(path) => self.replay(&path).await,
            None => Ok(false),
        }
    }

    // One click per hop, no retries; stops at the first unexpected scene.
    async fn replay(&mut self, path: &[NavigationEdge]) -> Result<bool, Halt> {
        for edge in path {
            let point = match self.resolve(edge).await? {
                Ok(point) => point,
                Err(e) => {
                    self.state.log(LogLevel::Debug, e.to_string());
                    return Ok(false);
                }
            };
            if self.click(point).await?.is_err() {
                return Ok(false);
            }
            let observation = self.observe().await?;
            if !observation.detection.scene.is(&edge.to) {
                self.state.log(
                    LogLevel::Debug,
                    format!(
                        "Repositioning via {} -> {} landed on {}",
                        edge.from, edge.to, observation.detection.scene
                    ),
                );
                return Ok(false);
            }
            self.arrive(&edge.to, observation.screenshot.as_ref());
        }
        Ok(true)
    }
}

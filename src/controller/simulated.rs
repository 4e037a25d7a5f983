//! In-process stand-in for a real desktop application.
//!
//! The simulated application derives its behaviour from the navigation map:
//! clicking the point the region resolver computes for an outgoing edge moves
//! to that edge's target, and clicking the back region moves to the hub. The
//! current scene is painted into the top-left pixel of every capture so that
//! [`SimulatedOcr`](crate::detection::SimulatedOcr) can read it back. It backs
//! the test suite and the CLI's rehearsal runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};

use crate::controller::app_controller::{
    AppController, MouseButton, Screenshot, WindowBounds, WindowHandle,
};
use crate::error::ControllerError;
use crate::navigation::NavigationGraph;
use crate::regions::{ClickRegionResolver, HeuristicRegionResolver};

const SIMULATED_PID: u32 = 4242;
const SIMULATED_WINDOW: WindowHandle = WindowHandle(0x5EED);
const FRAME_WIDTH: u32 = 32;
const FRAME_HEIGHT: u32 = 24;

/// Blue channel marker identifying a frame painted by the simulator.
pub(crate) const SCENE_MARKER: u8 = 0xA5;

/// Screen contents the simulator can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Scene(usize),
    Loading,
    Foreign,
}

impl Screen {
    fn paint(self) -> DynamicImage {
        let pixel = match self {
            // Scene indices are stored 1-based so that 0 never names a scene.
            Screen::Scene(index) => {
                let code = (index + 1) as u16;
                Rgb([(code >> 8) as u8, (code & 0xFF) as u8, SCENE_MARKER])
            }
            Screen::Loading => Rgb([0, 0, SCENE_MARKER]),
            Screen::Foreign => Rgb([255, 255, 255]),
        };
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, pixel))
    }
}

/// Every collaborator call the simulator received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCall {
    Launch(PathBuf),
    DetectWindow(String),
    Focus,
    WindowBounds,
    Capture,
    Click { x: i32, y: i32, button: MouseButton },
    Close,
    Sleep(Duration),
}

struct SimulatedState {
    running: bool,
    focused: bool,
    current: usize,
    stalled: bool,
    window_polls: u32,
    calls: Vec<ControllerCall>,
}

struct SimulatedBehaviour {
    graph: NavigationGraph,
    scenes: Vec<String>,
    resolver: Arc<dyn ClickRegionResolver>,
    bounds: WindowBounds,
    initial_scene: usize,
    window_appears_after: Option<u32>,
    launch_error: Option<ControllerError>,
    require_executable: bool,
    unresponsive_edges: HashSet<(String, String)>,
    steal_focus_on_click: bool,
}

#[derive(Clone)]
pub struct SimulatedApplication {
    behaviour: Arc<SimulatedBehaviour>,
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedApplication {
    pub fn builder(graph: NavigationGraph) -> SimulatedApplicationBuilder {
        SimulatedApplicationBuilder::new(graph)
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        // A poisoned lock only means a test thread panicked mid-call; the
        // state itself is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<ControllerCall> {
        self.lock().calls.clone()
    }

    pub fn click_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ControllerCall::Click { .. }))
            .count()
    }

    pub fn current_scene(&self) -> String {
        let current = self.lock().current;
        self.behaviour.scenes[current].clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    fn screen(&self, state: &SimulatedState) -> Screen {
        if !state.focused {
            Screen::Foreign
        } else if state.stalled {
            Screen::Loading
        } else {
            Screen::Scene(state.current)
        }
    }

    fn index_of(&self, scene: &str) -> Option<usize> {
        self.behaviour.scenes.iter().position(|s| s == scene)
    }

    // Returns the scene a click at (x, y) leads to, if any.
    fn hit_test(&self, from: usize, x: i32, y: i32) -> Option<(String, bool)> {
        let behaviour = &self.behaviour;
        let from_scene = &behaviour.scenes[from];
        for edge in behaviour.graph.edges_from(from_scene) {
            if let Ok(point) = behaviour.resolver.resolve(&behaviour.graph, edge, behaviour.bounds)
            {
                if point.x == x && point.y == y {
                    let responsive = !behaviour
                        .unresponsive_edges
                        .contains(&(edge.from.clone(), edge.to.clone()));
                    return Some((edge.to.clone(), responsive));
                }
            }
        }
        if let (Some(hub), Ok(back)) = (
            behaviour.graph.hub(),
            behaviour.resolver.resolve_back(behaviour.bounds),
        ) {
            if back.x == x && back.y == y {
                return Some((hub.to_string(), true));
            }
        }
        None
    }
}

#[async_trait]
impl AppController for SimulatedApplication {
    async fn launch(&self, path: &Path) -> Result<u32, ControllerError> {
        let mut state = self.lock();
        state.calls.push(ControllerCall::Launch(path.to_path_buf()));
        if self.behaviour.require_executable && !path.exists() {
            return Err(ControllerError::ExecutableNotFound(path.to_path_buf()));
        }
        if let Some(error) = &self.behaviour.launch_error {
            return Err(error.clone());
        }
        state.running = true;
        state.focused = false;
        state.stalled = false;
        state.window_polls = 0;
        state.current = self.behaviour.initial_scene;
        tracing::debug!(
            "Simulated application started in scene '{}'",
            self.behaviour.scenes[state.current]
        );
        Ok(SIMULATED_PID)
    }

    async fn detect_window(&self, title_hint: &str) -> Option<WindowHandle> {
        let mut state = self.lock();
        state
            .calls
            .push(ControllerCall::DetectWindow(title_hint.to_string()));
        if !state.running {
            return None;
        }
        state.window_polls += 1;
        match self.behaviour.window_appears_after {
            Some(polls) if state.window_polls > polls => Some(SIMULATED_WINDOW),
            _ => None,
        }
    }

    async fn focus(&self, window: WindowHandle) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.calls.push(ControllerCall::Focus);
        if !state.running || window != SIMULATED_WINDOW {
            return Err(ControllerError::NoWindow);
        }
        state.focused = true;
        Ok(())
    }

    async fn window_bounds(&self, window: WindowHandle) -> Result<WindowBounds, ControllerError> {
        let mut state = self.lock();
        state.calls.push(ControllerCall::WindowBounds);
        if !state.running || window != SIMULATED_WINDOW {
            return Err(ControllerError::NoWindow);
        }
        Ok(self.behaviour.bounds)
    }

    async fn capture_screenshot(&self) -> Result<Screenshot, ControllerError> {
        let mut state = self.lock();
        state.calls.push(ControllerCall::Capture);
        if !state.running {
            return Err(ControllerError::Capture("application is not running".to_string()));
        }
        Ok(Screenshot::new(self.screen(&state).paint()))
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.calls.push(ControllerCall::Click { x, y, button });
        if !state.running {
            return Err(ControllerError::Input("application is not running".to_string()));
        }
        if state.focused {
            match self.hit_test(state.current, x, y) {
                Some((target, true)) => {
                    if let Some(index) = self.index_of(&target) {
                        state.current = index;
                        state.stalled = false;
                    }
                }
                Some((_, false)) => state.stalled = true,
                None => {}
            }
        }
        if self.behaviour.steal_focus_on_click {
            state.focused = false;
        }
        Ok(())
    }

    async fn close(&self, window: WindowHandle) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.calls.push(ControllerCall::Close);
        if !state.running || window != SIMULATED_WINDOW {
            return Err(ControllerError::Close("no such window".to_string()));
        }
        state.running = false;
        state.focused = false;
        Ok(())
    }

    async fn sleep(&self, duration: Duration) {
        self.lock().calls.push(ControllerCall::Sleep(duration));
        tokio::task::yield_now().await;
    }

    fn name(&self) -> &'static str {
        "SimulatedApplication"
    }
}

pub struct SimulatedApplicationBuilder {
    graph: NavigationGraph,
    resolver: Arc<dyn ClickRegionResolver>,
    bounds: WindowBounds,
    initial_scene: Option<String>,
    window_appears_after: Option<u32>,
    launch_error: Option<ControllerError>,
    require_executable: bool,
    unresponsive_edges: HashSet<(String, String)>,
    steal_focus_on_click: bool,
}

impl SimulatedApplicationBuilder {
    pub fn new(graph: NavigationGraph) -> Self {
        Self {
            graph,
            resolver: Arc::new(HeuristicRegionResolver::default()),
            bounds: WindowBounds::new(0, 0, 1280, 720),
            initial_scene: None,
            window_appears_after: Some(0),
            launch_error: None,
            require_executable: false,
            unresponsive_edges: HashSet::new(),
            steal_focus_on_click: false,
        }
    }

    // Must match the resolver the engine uses, or clicks will miss.
    pub fn resolver(mut self, resolver: Arc<dyn ClickRegionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn bounds(mut self, bounds: WindowBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Scene shown right after launch; defaults to the graph's start scene.
    pub fn initial_scene(mut self, scene: impl Into<String>) -> Self {
        self.initial_scene = Some(scene.into());
        self
    }

    /// The window shows up on the poll after `polls` unsuccessful polls.
    pub fn window_appears_after(mut self, polls: u32) -> Self {
        self.window_appears_after = Some(polls);
        self
    }

    pub fn window_never_appears(mut self) -> Self {
        self.window_appears_after = None;
        self
    }

    pub fn launch_error(mut self, error: ControllerError) -> Self {
        self.launch_error = Some(error);
        self
    }

    /// Fail the launch when the executable path does not exist on disk.
    pub fn require_executable(mut self, require: bool) -> Self {
        self.require_executable = require;
        self
    }

    /// Clicking this edge leaves the application on a loading screen.
    pub fn unresponsive_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.unresponsive_edges.insert((from.into(), to.into()));
        self
    }

    /// Every click hands focus to some other window.
    pub fn steal_focus_on_click(mut self, steal: bool) -> Self {
        self.steal_focus_on_click = steal;
        self
    }

    pub fn build(self) -> SimulatedApplication {
        let scenes: Vec<String> = self.graph.scenes().cloned().collect();
        let initial = self
            .initial_scene
            .as_deref()
            .unwrap_or(self.graph.start())
            .to_string();
        let initial_scene = scenes.iter().position(|s| *s == initial).unwrap_or(0);
        SimulatedApplication {
            behaviour: Arc::new(SimulatedBehaviour {
                graph: self.graph,
                scenes,
                resolver: self.resolver,
                bounds: self.bounds,
                initial_scene,
                window_appears_after: self.window_appears_after,
                launch_error: self.launch_error,
                require_executable: self.require_executable,
                unresponsive_edges: self.unresponsive_edges,
                steal_focus_on_click: self.steal_focus_on_click,
            }),
            state: Arc::new(Mutex::new(SimulatedState {
                running: false,
                focused: false,
                current: initial_scene,
                stalled: false,
                window_polls: 0,
                calls: Vec::new(),
            })),
        }
    }
}

pub mod app_controller;
pub mod simulated;

pub use app_controller::{
    AppController, MouseButton, Screenshot, WindowBounds, WindowHandle,
};
pub use simulated::{ControllerCall, SimulatedApplication, SimulatedApplicationBuilder};

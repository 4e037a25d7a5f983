use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

/// Window rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowBounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub image: DynamicImage,
    pub captured_at: DateTime<Utc>,
}

impl Screenshot {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }
}

/// Capability surface of the automated desktop application.
///
/// Every call may block on the operating system, so the engine awaits each
/// one before issuing the next. Implementations own the platform details;
/// the engine only sees this trait.
#[async_trait]
pub trait AppController: Send + Sync {
    /// Starts the executable and returns its process id.
    async fn launch(&self, path: &Path) -> Result<u32, ControllerError>;

    /// Looks for a top-level window whose title contains `title_hint`.
    async fn detect_window(&self, title_hint: &str) -> Option<WindowHandle>;

    async fn focus(&self, window: WindowHandle) -> Result<(), ControllerError>;

    async fn window_bounds(&self, window: WindowHandle) -> Result<WindowBounds, ControllerError>;

    /// Captures whatever is on screen. Only meaningful after `focus`.
    async fn capture_screenshot(&self) -> Result<Screenshot, ControllerError>;

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), ControllerError>;

    async fn close(&self, window: WindowHandle) -> Result<(), ControllerError>;

    /// Cooperative delay; the engine never sleeps any other way.
    async fn sleep(&self, duration: Duration);

    fn name(&self) -> &'static str;
}

use serde::{Deserialize, Serialize};

/// A point expressed as fractions of the window width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x_pct: f32,
    pub y_pct: f32,
}

impl Region {
    pub const fn new(x_pct: f32, y_pct: f32) -> Self {
        Self { x_pct, y_pct }
    }
}

/// Percentage regions used when an edge carries no stored coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Back/home button, used for every edge into the hub.
    pub back: Region,
    /// Continue button for linear progressions.
    #[serde(rename = "continue")]
    pub continue_button: Region,
    /// Spoke buttons for fan-out scenes, indexed by sibling position.
    pub spokes: Vec<Region>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            back: Region::new(0.10, 0.90),
            continue_button: Region::new(0.50, 0.80),
            spokes: vec![
                Region::new(0.50, 0.50), // center
                Region::new(0.25, 0.50), // left
                Region::new(0.75, 0.50), // right
                Region::new(0.25, 0.75), // bottom-left
                Region::new(0.75, 0.75), // bottom-right
            ],
        }
    }
}

impl RegionConfig {
    /// Layout for applications whose back button sits in the top-left corner.
    pub fn top_left_back() -> Self {
        Self {
            back: Region::new(0.05, 0.08),
            ..Self::default()
        }
    }
}

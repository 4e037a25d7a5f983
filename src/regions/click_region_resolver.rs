use serde::Serialize;

use crate::controller::{MouseButton, WindowBounds};
use crate::error::NoRegionResolvedError;
use crate::navigation::{NavigationEdge, NavigationGraph};
use crate::regions::config::{Region, RegionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
}

/// Strategy turning a navigation edge into a screen coordinate.
///
/// The engine only depends on this trait, so a resolver that finds real UI
/// elements can replace the heuristics without touching the traversal.
pub trait ClickRegionResolver: Send + Sync {
    fn resolve(
        &self,
        graph: &NavigationGraph,
        edge: &NavigationEdge,
        bounds: WindowBounds,
    ) -> Result<ClickPoint, NoRegionResolvedError>;

    /// Click point of the back/home control, used to return to the hub.
    fn resolve_back(&self, bounds: WindowBounds) -> Result<ClickPoint, NoRegionResolvedError>;

    fn name(&self) -> &'static str;
}

/// Best-effort percentage heuristics. First matching rule wins:
/// stored coordinates, edge into the hub, linear progression, spoke index.
#[derive(Debug, Clone, Default)]
pub struct HeuristicRegionResolver {
    config: RegionConfig,
}

impl HeuristicRegionResolver {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    fn scale(
        region: Region,
        bounds: WindowBounds,
        button: MouseButton,
        from: &str,
        to: &str,
    ) -> Result<ClickPoint, NoRegionResolvedError> {
        if bounds.is_empty() {
            return Err(NoRegionResolvedError {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("window has no area ({}x{})", bounds.width, bounds.height),
            });
        }
        Ok(ClickPoint {
            x: bounds.x + (bounds.width as f32 * region.x_pct).round() as i32,
            y: bounds.y + (bounds.height as f32 * region.y_pct).round() as i32,
            button,
        })
    }
}

impl ClickRegionResolver for HeuristicRegionResolver {
    fn resolve(
        &self,
        graph: &NavigationGraph,
        edge: &NavigationEdge,
        bounds: WindowBounds,
    ) -> Result<ClickPoint, NoRegionResolvedError> {
        let (from, to) = (edge.from.as_str(), edge.to.as_str());

        if let Some(hint) = edge.click {
            let region = Region::new(hint.x_pct, hint.y_pct);
            return Self::scale(region, bounds, hint.button, from, to);
        }

        if graph.is_hub(to) {
            return Self::scale(self.config.back, bounds, MouseButton::Left, from, to);
        }

        let siblings = graph.edges_from(from);
        if siblings.len() == 1 {
            return Self::scale(
                self.config.continue_button,
                bounds,
                MouseButton::Left,
                from,
                to,
            );
        }

        let index = graph.sibling_index(edge).ok_or_else(|| NoRegionResolvedError {
            from: from.to_string(),
            to: to.to_string(),
            reason: "edge is not part of the graph".to_string(),
        })?;
        match self.config.spokes.get(index) {
            Some(region) => Self::scale(*region, bounds, MouseButton::Left, from, to),
            None => Err(NoRegionResolvedError {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!(
                    "spoke index {} exceeds the {} configured spoke positions",
                    index,
                    self.config.spokes.len()
                ),
            }),
        }
    }

    fn resolve_back(&self, bounds: WindowBounds) -> Result<ClickPoint, NoRegionResolvedError> {
        Self::scale(self.config.back, bounds, MouseButton::Left, "*", "hub")
    }

    fn name(&self) -> &'static str {
        "HeuristicRegionResolver"
    }
}

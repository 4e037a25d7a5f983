pub mod click_region_resolver;
pub mod config;

pub use click_region_resolver::{ClickPoint, ClickRegionResolver, HeuristicRegionResolver};
pub use config::{Region, RegionConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::DetectionConfig;
use crate::error::NavigatorError;
use crate::regions::RegionConfig;

const ENV_PREFIX: &str = "NAVIGATOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub app_path: PathBuf,
    pub map_path: PathBuf,
    pub output_dir: PathBuf,
    pub window_title_hint: String,
    pub report_file: String,
    pub screenshot_dir: String,
    pub retry_bound: u32,
    pub timing: TimingConfig,
    pub detection: DetectionConfig,
    pub regions: RegionConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            app_path: PathBuf::new(),
            map_path: PathBuf::from("navigation_map.json"),
            output_dir: PathBuf::from("navigation_output"),
            window_title_hint: String::new(),
            report_file: "navigation_report.json".to_string(),
            screenshot_dir: "screenshots".to_string(),
            retry_bound: 3,
            timing: TimingConfig::default(),
            detection: DetectionConfig::default(),
            regions: RegionConfig::default(),
        }
    }
}

impl Configuration {
    /// Defaults, then the optional file, then `NAVIGATOR__*` environment
    /// variables (`NAVIGATOR__TIMING__NAVIGATION_SETTLE_MS=5000`).
    pub fn load(file: Option<&Path>) -> Result<Self, NavigatorError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Configuration::default())?);
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        let configuration = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(configuration)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }

    pub fn screenshot_path(&self) -> PathBuf {
        self.output_dir.join(&self.screenshot_dir)
    }

    /// Window title to wait for; falls back to the executable's file stem.
    pub fn effective_title_hint(&self) -> String {
        if !self.window_title_hint.is_empty() {
            return self.window_title_hint.clone();
        }
        self.app_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Fixed delays that stand in for "the application finished loading".
/// They are the main source of flakiness in real runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub launch_settle_ms: u64,
    pub window_timeout_ms: u64,
    pub window_poll_ms: u64,
    pub focus_settle_ms: u64,
    pub navigation_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            launch_settle_ms: 2_000,
            window_timeout_ms: 30_000,
            window_poll_ms: 500,
            focus_settle_ms: 500,
            navigation_settle_ms: 3_000,
        }
    }
}

impl TimingConfig {
    /// No settle delays at all; for simulated applications.
    pub fn immediate() -> Self {
        Self {
            launch_settle_ms: 0,
            window_timeout_ms: 1_000,
            window_poll_ms: 100,
            focus_settle_ms: 0,
            navigation_settle_ms: 0,
        }
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn window_poll(&self) -> Duration {
        Duration::from_millis(self.window_poll_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    /// Number of window polls that fit in the timeout, at least one.
    pub fn window_poll_attempts(&self) -> u64 {
        (self.window_timeout_ms / self.window_poll_ms.max(1)).max(1)
    }
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::controller::Screenshot;
use crate::error::NavigatorError;
use crate::traversal::ScreenshotRecord;

/// Writes one PNG per visited scene, named after the scene id.
pub struct ScreenshotStore {
    directory: PathBuf,
    used_names: HashSet<String>,
}

impl ScreenshotStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            used_names: HashSet::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn store(
        &mut self,
        scene: &str,
        screenshot: &Screenshot,
    ) -> Result<ScreenshotRecord, NavigatorError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| {
            NavigatorError::Artifact(image::ImageError::IoError(e), self.directory.clone())
        })?;

        let filename = self.unique_filename(scene);
        let path = self.directory.join(&filename);
        screenshot
            .image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| NavigatorError::Artifact(e, path.clone()))?;
        tracing::debug!("Saved screenshot for '{}' to {}", scene, path.display());

        Ok(ScreenshotRecord {
            scene: scene.to_string(),
            filename,
            path,
            timestamp: screenshot.captured_at,
        })
    }

    // Scene ids such as "Lab A" and "Lab_A" sanitise to the same stem.
    fn unique_filename(&mut self, scene: &str) -> String {
        let stem = sanitize_file_stem(scene);
        let mut candidate = format!("{}.png", stem);
        let mut suffix = 2;
        while !self.used_names.insert(candidate.clone()) {
            candidate = format!("{}_{}.png", stem, suffix);
            suffix += 1;
        }
        candidate
    }
}

fn sanitize_file_stem(scene: &str) -> String {
    let stem: String = scene
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "scene".to_string()
    } else {
        stem
    }
}

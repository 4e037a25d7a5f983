use serde::{Deserialize, Serialize};

/// Tunables for OCR-based scene detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Scores below this are reported as an unknown scene. Zero accepts
    /// any non-zero match.
    pub confidence_threshold: f32,
    /// Minimum similarity for a fuzzy token match to count at all.
    pub token_similarity: f32,
    pub ocr_timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.0,
            token_similarity: 0.8,
            ocr_timeout_ms: 10_000,
        }
    }
}

impl DetectionConfig {
    /// Only exact phrase matches are accepted.
    pub fn strict() -> Self {
        Self {
            confidence_threshold: 1.0,
            ..Self::default()
        }
    }
}

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::controller::Screenshot;
use crate::detection::config::DetectionConfig;
use crate::detection::matching::{containment_score, normalize_scene_name, normalize_text};
use crate::detection::ocr::TextExtractor;
use crate::error::DetectionFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedScene {
    Known(String),
    Unknown,
}

impl DetectedScene {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            DetectedScene::Known(scene) => Some(scene),
            DetectedScene::Unknown => None,
        }
    }

    pub fn is(&self, scene: &str) -> bool {
        self.as_known() == Some(scene)
    }
}

impl fmt::Display for DetectedScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectedScene::Known(scene) => write!(f, "{}", scene),
            DetectedScene::Unknown => write!(f, "<unknown>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneDetectionResult {
    pub scene: DetectedScene,
    pub confidence: f32,
    pub raw_text: String,
}

impl SceneDetectionResult {
    pub fn unknown(raw_text: impl Into<String>) -> Self {
        Self {
            scene: DetectedScene::Unknown,
            confidence: 0.0,
            raw_text: raw_text.into(),
        }
    }
}

struct KnownScene {
    id: String,
    normalized: String,
}

/// Identifies the current scene from a capture by running OCR and fuzzy
/// matching the text against every known scene name.
pub struct SceneDetector {
    scenes: Vec<KnownScene>,
    extractor: Box<dyn TextExtractor>,
    config: DetectionConfig,
}

impl SceneDetector {
    pub fn new<I, S>(
        known_scenes: I,
        extractor: Box<dyn TextExtractor>,
        config: DetectionConfig,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scenes = known_scenes
            .into_iter()
            .map(|id| {
                let id = id.into();
                KnownScene {
                    normalized: normalize_scene_name(&id),
                    id,
                }
            })
            .collect();
        Self {
            scenes,
            extractor,
            config,
        }
    }

    pub async fn detect(
        &self,
        screenshot: &Screenshot,
    ) -> Result<SceneDetectionResult, DetectionFailure> {
        let timeout = Duration::from_millis(self.config.ocr_timeout_ms);
        let text = tokio::time::timeout(timeout, self.extractor.extract_text(&screenshot.image))
            .await
            .map_err(|_| DetectionFailure::Timeout(self.config.ocr_timeout_ms))??;
        Ok(self.detect_text(&text))
    }

    /// Matching half of detection, for text that is already extracted.
    pub fn detect_text(&self, raw_text: &str) -> SceneDetectionResult {
        let text = normalize_text(raw_text);
        if text.is_empty() {
            return SceneDetectionResult::unknown(raw_text);
        }

        let mut best: Option<(&KnownScene, f32)> = None;
        for scene in &self.scenes {
            let score = containment_score(&scene.normalized, &text, self.config.token_similarity);
            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    score > current_score
                        || (score == current_score
                            && scene.normalized.len() > current.normalized.len())
                }
            };
            if better {
                best = Some((scene, score));
            }
        }

        match best {
            Some((scene, score)) if score > 0.0 && score >= self.config.confidence_threshold => {
                tracing::debug!("Detected scene '{}' (confidence {:.2})", scene.id, score);
                SceneDetectionResult {
                    scene: DetectedScene::Known(scene.id.clone()),
                    confidence: score,
                    raw_text: raw_text.to_string(),
                }
            }
            Some((scene, score)) => {
                tracing::debug!(
                    "No scene matched; best candidate '{}' scored {:.2}",
                    scene.id,
                    score
                );
                SceneDetectionResult {
                    scene: DetectedScene::Unknown,
                    confidence: score,
                    raw_text: raw_text.to_string(),
                }
            }
            None => SceneDetectionResult::unknown(raw_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, Rgb};

    struct FixedText(&'static str);

    #[async_trait]
    impl TextExtractor for FixedText {
        async fn extract_text(&self, _image: &DynamicImage) -> Result<String, DetectionFailure> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &'static str {
            "FixedText"
        }
    }

    struct NeverAnswers;

    #[async_trait]
    impl TextExtractor for NeverAnswers {
        async fn extract_text(&self, _image: &DynamicImage) -> Result<String, DetectionFailure> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }

        fn name(&self) -> &'static str {
            "NeverAnswers"
        }
    }

    fn detector(extractor: Box<dyn TextExtractor>, config: DetectionConfig) -> SceneDetector {
        SceneDetector::new(
            ["Menu", "MainMenu", "CareerLab", "Settings"],
            extractor,
            config,
        )
    }

    fn screenshot() -> Screenshot {
        Screenshot::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            8,
            8,
            Rgb([0, 0, 0]),
        )))
    }

    #[test]
    fn test_exact_match() {
        let d = detector(Box::new(FixedText("")), DetectionConfig::default());
        let result = d.detect_text("SETTINGS\nAudio  Video");
        assert_eq!(result.scene, DetectedScene::Known("Settings".to_string()));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_longer_name_wins_ties() {
        let d = detector(Box::new(FixedText("")), DetectionConfig::default());
        let result = d.detect_text("Main Menu");
        assert!(result.scene.is("MainMenu"));
    }

    #[test]
    fn test_fuzzy_match_below_full_confidence() {
        let d = detector(Box::new(FixedText("")), DetectionConfig::default());
        let result = d.detect_text("Carer Lab");
        assert!(result.scene.is("CareerLab"));
        assert!(result.confidence < 1.0);
    }

    #[test]
    fn test_threshold_rejects_weak_match() {
        let d = detector(Box::new(FixedText("")), DetectionConfig::strict());
        let result = d.detect_text("Carer Lab");
        assert_eq!(result.scene, DetectedScene::Unknown);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_empty_text_is_unknown() {
        let d = detector(Box::new(FixedText("")), DetectionConfig::default());
        let result = d.detect_text("  \n ");
        assert_eq!(result.scene, DetectedScene::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_unrelated_text_is_unknown() {
        let d = detector(Box::new(FixedText("")), DetectionConfig::default());
        let result = d.detect_text("Loading, please wait");
        assert_eq!(result.scene, DetectedScene::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_detect_runs_ocr() {
        let d = detector(Box::new(FixedText("Career Lab")), DetectionConfig::default());
        let result = d.detect(&screenshot()).await.unwrap();
        assert!(result.scene.is("CareerLab"));
        assert_eq!(result.raw_text, "Career Lab");
    }

    #[tokio::test]
    async fn test_ocr_timeout_is_a_detection_failure() {
        let config = DetectionConfig {
            ocr_timeout_ms: 50,
            ..DetectionConfig::default()
        };
        let d = detector(Box::new(NeverAnswers), config);
        let result = d.detect(&screenshot()).await;
        assert_eq!(result, Err(DetectionFailure::Timeout(50)));
    }
}

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use image::DynamicImage;

use crate::controller::simulated::SCENE_MARKER;
use crate::error::DetectionFailure;

/// Black-box OCR engine.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &DynamicImage) -> Result<String, DetectionFailure>;

    fn name(&self) -> &'static str;
}

/// Reads the scene code the simulated application paints into each frame
/// and answers with the scene's caption, the way real OCR would.
pub struct SimulatedOcr {
    scenes: Vec<String>,
    failures_remaining: AtomicU32,
}

impl SimulatedOcr {
    pub fn new(scenes: Vec<String>) -> Self {
        Self {
            scenes,
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// The next `count` calls fail as if the OCR engine crashed.
    pub fn failing_first(self, count: u32) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl TextExtractor for SimulatedOcr {
    async fn extract_text(&self, image: &DynamicImage) -> Result<String, DetectionFailure> {
        let pending = self.failures_remaining.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_remaining.store(pending - 1, Ordering::SeqCst);
            return Err(DetectionFailure::Ocr("simulated OCR crash".to_string()));
        }

        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Ok(String::new());
        }
        let [high, low, marker] = rgb.get_pixel(0, 0).0;
        if marker != SCENE_MARKER {
            return Ok("Recycle Bin  This PC  Taskbar".to_string());
        }
        let code = ((high as usize) << 8) | low as usize;
        match code.checked_sub(1).and_then(|index| self.scenes.get(index)) {
            Some(scene) => Ok(format!("{}\nBack   Continue", scene)),
            // Loading screens carry no text.
            None => Ok(String::new()),
        }
    }

    fn name(&self) -> &'static str {
        "SimulatedOcr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn frame(pixel: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb(pixel)))
    }

    #[tokio::test]
    async fn test_reads_scene_caption() {
        let ocr = SimulatedOcr::new(vec!["Title".into(), "Settings".into()]);
        let text = ocr.extract_text(&frame([0, 2, SCENE_MARKER])).await.unwrap();
        assert!(text.starts_with("Settings"));
    }

    #[tokio::test]
    async fn test_loading_and_foreign_frames() {
        let ocr = SimulatedOcr::new(vec!["Title".into()]);
        assert_eq!(
            ocr.extract_text(&frame([0, 0, SCENE_MARKER])).await.unwrap(),
            ""
        );
        let foreign = ocr.extract_text(&frame([255, 255, 255])).await.unwrap();
        assert!(foreign.contains("Taskbar"));
    }

    #[tokio::test]
    async fn test_failing_first() {
        let ocr = SimulatedOcr::new(vec!["Title".into()]).failing_first(1);
        assert!(ocr.extract_text(&frame([0, 1, SCENE_MARKER])).await.is_err());
        assert!(ocr.extract_text(&frame([0, 1, SCENE_MARKER])).await.is_ok());
    }
}

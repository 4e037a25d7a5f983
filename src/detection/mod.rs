pub mod config;
pub mod matching;
pub mod ocr;
pub mod scene_detector;

pub use config::DetectionConfig;
pub use ocr::{SimulatedOcr, TextExtractor};
pub use scene_detector::{DetectedScene, SceneDetectionResult, SceneDetector};

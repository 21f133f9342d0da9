mod command;
mod error;
mod labels;
mod render;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use command::CommandDetector;
pub use error::DetectError;
pub use labels::{normalize, parse_labels, read_labels, write_labels};
pub use render::draw_detections;

/// One oriented box: class id and four corners as alternating x/y in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub points: [f32; 8],
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Rendered image with the boxes drawn.
    pub image: PathBuf,
    pub labels: Option<PathBuf>,
    pub detections: Vec<Detection>,
}

pub trait Detector: Send + Sync {
    fn detect(&self, image: &Path) -> Result<DetectionResult, DetectError>;
}

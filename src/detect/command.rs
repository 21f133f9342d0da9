use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::error::DetectError;
use crate::detect::labels::{normalize, read_labels, write_labels};
use crate::detect::render::render_to;
use crate::detect::{DetectionResult, Detector};
use crate::executor::{self, ExternalCommand};

/// Runs an external oriented-box detector.
///
/// The command receives `$image` (composite path) and `$labels` (where it must
/// write one `class x1 y1 .. x4 y4` line per object, in pixels).
#[derive(Debug, Clone)]
pub struct CommandDetector {
    command: ExternalCommand,
    results_dir: PathBuf,
}

impl CommandDetector {
    pub fn new(command: ExternalCommand, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            results_dir: results_dir.into(),
        }
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.results_dir.join("labels")
    }

    pub fn inference_dir(&self) -> PathBuf {
        self.results_dir.join("inference")
    }

    fn raw_dir(&self) -> PathBuf {
        self.results_dir.join("raw")
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image: &Path) -> Result<DetectionResult, DetectError> {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let extension = image
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jpg".to_string());

        for dir in [self.labels_dir(), self.inference_dir(), self.raw_dir()] {
            fs::create_dir_all(dir)?;
        }
        // One raw directory per invocation; its name keys every output of this run.
        let raw = tempfile::Builder::new()
            .prefix(&format!("{}.", stem))
            .keep(true)
            .tempdir_in(self.raw_dir())?;
        let run_name = raw
            .path()
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());
        let raw_labels = raw.path().join("labels.txt");

        let image_arg = image.to_string_lossy().into_owned();
        let labels_arg = raw_labels.to_string_lossy().into_owned();
        executor::run(
            &self.command,
            &[("image", image_arg.as_str()), ("labels", labels_arg.as_str())],
            raw.path(),
            "detect",
        )?;

        let (width, height) =
            image::image_dimensions(image).map_err(|source| DetectError::Image {
                path: image.to_path_buf(),
                source,
            })?;

        // No label file means nothing was found.
        let detections: Vec<_> = if raw_labels.exists() {
            read_labels(&raw_labels)?
                .iter()
                .map(|d| normalize(d, width, height))
                .collect()
        } else {
            Vec::new()
        };

        let labels = self.labels_dir().join(format!("{}.txt", run_name));
        write_labels(&labels, &detections)?;

        let rendered = self.inference_dir().join(format!("{}.{}", run_name, extension));
        render_to(image, &rendered, &detections)?;

        log::debug!("{} detections in {}", detections.len(), image.display());
        Ok(DetectionResult {
            image: rendered,
            labels: Some(labels),
            detections,
        })
    }
}

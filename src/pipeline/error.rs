use thiserror::Error;

use crate::catalogue::CatalogueError;
use crate::detect::DetectError;
use crate::executor::ExecError;
use crate::imagery::RasterError;
use crate::predict::PredictError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("prediction: {0}")]
    Predict(#[from] PredictError),
    #[error("catalogue: {0}")]
    Catalogue(#[from] CatalogueError),
    #[error("raster: {0}")]
    Raster(#[from] RasterError),
    #[error("detection: {0}")]
    Detect(#[from] DetectError),
    #[error("transcode: {0}")]
    Transcode(#[from] ExecError),
    #[error("deadline exceeded for vessel {0}")]
    DeadlineExceeded(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Local disk failures abort the whole run. Everything else is skip-and-continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Io(_) => true,
            PipelineError::Store(StoreError::Io(_)) => true,
            PipelineError::Catalogue(CatalogueError::Io(_)) => true,
            PipelineError::Transcode(ExecError::Io(_)) => true,
            PipelineError::Raster(e) => e.is_fatal(),
            PipelineError::Detect(e) => e.is_fatal(),
            _ => false,
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::executor::ExecError;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector failed: {0}")]
    Command(#[from] ExecError),
    #[error("bad label line {line} in {path}: {message}")]
    Labels {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("cannot read image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DetectError::Io(_))
    }
}

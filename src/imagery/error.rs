use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("band file missing: {0}")]
    Missing(PathBuf),
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("patch {patch_width}x{patch_height} exceeds raster {width}x{height}")]
    PatchTooLarge {
        patch_width: u32,
        patch_height: u32,
        width: u32,
        height: u32,
    },
    #[error("step size must be positive, got {0}x{1}")]
    InvalidStep(u32, u32),
    #[error("band sizes differ: {0}")]
    DimensionMismatch(String),
    #[error("world file {path}: {message}")]
    WorldFile { path: PathBuf, message: String },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RasterError {
    /// Local write failures end the run; everything else skips the band or patch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RasterError::Io(_) | RasterError::Write { .. })
    }
}

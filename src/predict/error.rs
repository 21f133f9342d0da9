use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("TLE directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("TLE file read error: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Invalid ephemeris for {satellite}: {message}")]
    InvalidEphemeris { satellite: String, message: String },
    #[error("Propagation error: {0}")]
    Propagation(String),
}

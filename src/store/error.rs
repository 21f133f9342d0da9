use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("TLE error: {0}")]
    Tle(#[from] crate::predict::PredictError),
}

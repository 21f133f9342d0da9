use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },
    #[error("catalogue query failed ({status}): {body}")]
    Query { status: u16, body: String },
    #[error("download of {url} failed ({status}): {body}")]
    Download {
        status: u16,
        url: String,
        body: String,
    },
    #[error("too many redirects resolving {0}")]
    TooManyRedirects(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid band path: {0}")]
    InvalidBandPath(String),
    #[error("manifest parse error: {0}")]
    ManifestParse(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogueError {
    /// The server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            CatalogueError::Query { status: 401, .. } | CatalogueError::Download { status: 401, .. }
        )
    }
}

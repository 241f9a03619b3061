use thiserror::Error;

/// Errors that abort a collection download.
///
/// Per-item problems (missing image, failed fetch) are not errors at this
/// level, they end up as a failed `DownloadOutcome` instead.
#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Too many requests sent to {0}")]
    Throttled(String),
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for DownloaderError {
    fn from(e: config::ConfigError) -> Self {
        DownloaderError::Config(e.to_string())
    }
}

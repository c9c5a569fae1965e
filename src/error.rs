use thiserror::Error;

/// Errors surfaced by the cloning engine.
///
/// Only `InvalidSeedUrl` and failures to create the output root stop a run. Everything
/// else is logged and folded into the `CloneReport`.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("invalid seed URL '{0}': {1}")]
    InvalidSeedUrl(String, String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid link filter pattern: {0}")]
    Filter(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloneError>;

//! Error types for harvesting operations

/// Result type for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Corrupt state for key '{key}': {reason}")]
    CorruptState { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl HarvestError {
    /// Whether the failure came from the remote API rather than local state or I/O
    pub fn is_api_failure(&self) -> bool {
        matches!(
            self,
            HarvestError::QuotaExceeded(_)
                | HarvestError::Api { .. }
                | HarvestError::Http(_)
                | HarvestError::UnexpectedResponse(_)
        )
    }
}

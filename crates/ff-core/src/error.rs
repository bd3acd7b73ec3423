//! Error types for Footfall

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum FfError {
    /// Malformed or cyclic configuration. Fatal at load time; the previously
    /// installed registry generation stays active.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Programming error, e.g. asking a terminal event type for its target.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FfError {
    pub fn config(msg: impl Into<String>) -> Self {
        FfError::Configuration(msg.into())
    }

    /// Whether this error came from profile contents rather than I/O
    pub fn is_configuration(&self) -> bool {
        matches!(self, FfError::Configuration(_) | FfError::Json(_))
    }
}

/// Result type alias
pub type FfResult<T> = Result<T, FfError>;

//! Error types for Guidepost

use thiserror::Error;

/// Result type alias for Guidepost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while perceiving, guiding, or speaking
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote call failed (non-success status, unreachable host)
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote call exceeded the configured deadline
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Response body could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// A required collaborator is missing
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Requested object is not among the latest detections
    #[error("not found: {0}")]
    NotFound(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this failure happened at the network level
    ///
    /// Transport failures are the only ones that trigger a fallback hop;
    /// parse failures mean the remote answered and had nothing usable.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Http(_))
    }
}

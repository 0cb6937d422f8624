//! Error types for the Gerrit client.

use thiserror::Error;

/// Result type for Gerrit client operations.
pub type Result<T> = std::result::Result<T, GerritError>;

/// Gerrit client errors.
#[derive(Debug, Error)]
pub enum GerritError {
    /// Network error (connection failed, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the server
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid JSON or unexpected response shape
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Base URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

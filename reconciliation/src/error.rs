//! Error types for reconciliation

use thiserror::Error;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP client error (connection, timeout)
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// External source replied with a non-success status
    #[error("Upstream error {status_code}: {message}")]
    Upstream {
        /// HTTP status code
        status_code: u16,
        /// Response body
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML error
    #[error("XML error: {0}")]
    Xml(String),

    /// Deposit repository error
    #[error("Repository error: {0}")]
    Repository(#[from] deposit_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

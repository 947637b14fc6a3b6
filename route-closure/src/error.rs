//! Error types for route closure

use thiserror::Error;

/// Result type for closure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Closure errors
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP client error (connection, timeout)
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Legacy endpoint replied with a non-success status
    #[error("Legacy endpoint error {status_code}: {message}")]
    Endpoint {
        /// HTTP status code
        status_code: u16,
        /// Response body
        message: String,
    },

    /// Legacy endpoint replied 2xx but rejected the closure
    #[error("Closure of route {route_id} rejected: {marker}")]
    Rejected {
        /// Dispatched route id
        route_id: u32,
        /// Result marker from the reply body
        marker: String,
    },

    /// Envelope serialization error
    #[error("Envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (audit artifacts, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Deposit repository error
    #[error("Repository error: {0}")]
    Repository(#[from] deposit_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

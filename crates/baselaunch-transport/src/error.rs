//! Transport error types

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while performing a single transport attempt
#[derive(Debug, Error)]
pub enum TransportError {
    /// The attempt did not complete in time
    #[error("Timeout")]
    Timeout,

    /// Transport-level failure (DNS, refused connection, reset)
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP protocol failure while sending or reading the response
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic transport error
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the failure happened below HTTP (no response was received)
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Io(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

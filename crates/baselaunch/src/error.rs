//! Error types for the baselaunch runtime
//!
//! Two error families live here: [`Error`] for the request pipeline and
//! configuration, and [`StorageError`] for the key-value store backends.
//! Neither crosses the pipeline boundary: `ApiClient` converts failures into
//! an [`ApiResult::Failure`](crate::types::ApiResult) message.

use crate::messages;
use baselaunch_transport::TransportError;
use thiserror::Error;

/// Result type alias for fallible baselaunch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the baselaunch runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The attempt did not complete before its deadline.
    #[error("{}", messages::TIMEOUT_ERROR)]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Reason phrase
        status_text: String,
    },

    /// No response was received (refused, reset, DNS, protocol failure).
    #[error("Network error: {0}")]
    Network(String),

    /// Key-value store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Response body or payload could not be (de)serialized.
    #[error("Failed to parse response: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Origin plus endpoint did not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// User input failed a validation rule.
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Anything else.
    #[error("{0}")]
    Unknown(String),
}

impl Error {
    /// Check if this error is retryable by the request pipeline.
    ///
    /// Everything that happened on the wire is retried except 401/403.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout | Error::Network(_) | Error::Serialization(_) | Error::Unknown(_) => {
                true
            }
            Error::HttpStatus { .. } => !self.is_auth_failure(),
            Error::Storage(_)
            | Error::InvalidUrl(_)
            | Error::Config(_)
            | Error::Validation { .. } => false,
        }
    }

    /// Whether the server rejected the credential (401 or 403).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::HttpStatus { status: 401 | 403, .. })
    }

    /// Human-facing message for this category of failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Timeout => messages::TIMEOUT_ERROR,
            Error::Network(_) => messages::NETWORK_ERROR,
            Error::HttpStatus { .. } if self.is_auth_failure() => messages::AUTH_ERROR,
            Error::Storage(_) => messages::STORAGE_ERROR,
            Error::Validation { .. } => messages::VALIDATION_ERROR,
            _ => messages::UNKNOWN_ERROR,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Error::Timeout,
            TransportError::Connection(msg) | TransportError::Http(msg) => Error::Network(msg),
            TransportError::Io(e) => Error::Network(e.to_string()),
            TransportError::Other(msg) => Error::Unknown(msg),
        }
    }
}

/// Errors raised by [`StorageBackend`](crate::storage::StorageBackend)
/// implementations and the store's own encoding.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The durable medium cannot be used at all.
    #[error("storage is unavailable")]
    Unavailable,

    /// Writing would exceed the backend's capacity.
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        /// Total bytes the write would have required
        needed: usize,
        /// Backend capacity in bytes
        quota: usize,
    },

    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes are not a valid entry.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether this is the capacity-exhausted condition that triggers cleanup.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

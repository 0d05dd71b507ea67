//! Centralized observability utilities for structured logging
//!
//! Every API request and its outcome is logged through this layer so the
//! field names stay consistent across the pipeline, the offline queue, and
//! the live-update channel.

use baselaunch_core::clock::SharedClock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// API request metadata for structured logging
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Endpoint path
    pub path: String,
    /// Request body size in bytes (optional)
    pub body_size: Option<usize>,
}

impl RequestMetadata {
    /// Create new request metadata
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body_size: None,
        }
    }

    /// Set the request body size
    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }

    /// Log request being sent
    pub fn log_request(&self) {
        debug!(
            method = %self.method,
            path = %self.path,
            body_size = self.body_size,
            "Sending API request"
        );
    }

    /// Log a failed attempt that may be retried
    pub fn log_attempt_failed(&self, attempt: u32, error: &str) {
        debug!(
            method = %self.method,
            path = %self.path,
            attempt,
            error = %error,
            "API request attempt failed"
        );
    }
}

/// API response metadata for structured logging
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// HTTP status code, if a response arrived
    pub status: Option<u16>,
    /// Time elapsed for the request, retries included
    pub elapsed: Duration,
    /// Number of retries taken (if any)
    pub retries: u32,
}

impl ResponseMetadata {
    /// Create new response metadata
    pub fn new(status: Option<u16>, elapsed: Duration) -> Self {
        Self {
            status,
            elapsed,
            retries: 0,
        }
    }

    /// Set the number of retries
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Log successful response
    pub fn log_success(&self, request: &RequestMetadata) {
        info!(
            method = %request.method,
            path = %request.path,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis(),
            retries = self.retries,
            "API request succeeded"
        );
    }

    /// Log failed response
    pub fn log_error(&self, request: &RequestMetadata, error: &str) {
        warn!(
            method = %request.method,
            path = %request.path,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis(),
            error = %error,
            retries = self.retries,
            "API request failed"
        );
    }
}

/// Timer for measuring request duration against the runtime clock
pub struct RequestTimer {
    clock: SharedClock,
    start: u64,
}

impl RequestTimer {
    /// Start a new timer
    pub fn start(clock: SharedClock) -> Self {
        let start = clock.now_millis();
        Self { clock, start }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.clock.now_millis().saturating_sub(self.start))
    }
}

/// Log validation error
pub fn log_validation_error(field: &str, reason: &str) {
    debug!(
        field = %field,
        reason = %reason,
        "Input validation failed"
    );
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `baselaunch=info` when `RUST_LOG` is unset. Calling this
/// more than once is harmless; later calls leave the first subscriber in place.
#[cfg(feature = "trace")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("baselaunch=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

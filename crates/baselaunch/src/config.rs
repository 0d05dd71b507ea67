//! Configuration for the baselaunch runtime

use crate::error::{Error, Result};
use crate::{
    DEFAULT_MAX_RETRIES, DEFAULT_ORIGIN, DEFAULT_TIMEOUT_MS, SCHEMA_VERSION, STORAGE_PREFIX,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default bound on queued offline actions.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 100;

/// Configuration for the runtime.
///
/// Every component reads its knobs from here; [`crate::Runtime`] wires them.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Origin endpoints are appended to
    pub origin: String,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each subsequent one
    pub initial_backoff: Duration,

    /// Upper bound on any single backoff delay
    pub max_backoff: Duration,

    /// Headers sent with every request, below caller headers
    pub default_headers: BTreeMap<String, String>,

    /// Storage key namespace
    pub storage_prefix: String,

    /// Schema version stamped on stored entries
    pub schema_version: String,

    /// Age after which stored entries are purged during quota recovery
    pub retention: Duration,

    /// Bound on queued offline actions; the oldest is dropped when full
    pub max_queue_len: usize,

    /// Default toast display time
    pub toast_duration: Duration,

    /// Maximum visible toasts
    pub max_toasts: usize,

    /// Base interval for live-update reconnects; the n-th retry waits n times this
    pub live_retry_interval: Duration,

    /// Reconnect attempts before the live channel gives up
    pub live_max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60 * 60),
            default_headers: BTreeMap::new(),
            storage_prefix: STORAGE_PREFIX.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            retention: crate::storage::RETENTION,
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
            toast_duration: crate::notify::DEFAULT_DURATION,
            max_toasts: crate::notify::DEFAULT_MAX_TOASTS,
            live_retry_interval: Duration::from_secs(5),
            live_max_retries: 5,
        }
    }
}

impl ClientConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// This will look for:
    /// - `BASELAUNCH_ORIGIN` for the API origin
    /// - `BASELAUNCH_TIMEOUT_MS` for the per-attempt timeout (milliseconds)
    /// - `BASELAUNCH_MAX_RETRIES` for the retry count
    /// - `BASELAUNCH_STORAGE_PREFIX` for the storage namespace
    /// - `BASELAUNCH_SCHEMA_VERSION` for the stored schema version
    /// - `BASELAUNCH_MAX_QUEUE_LEN` for the offline queue bound
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a numeric variable does not parse.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        use std::env;

        let mut config = Self::default();

        if let Ok(origin) = env::var("BASELAUNCH_ORIGIN") {
            config.origin = origin;
        }

        if let Some(timeout_ms) = parse_env::<u64>("BASELAUNCH_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(timeout_ms);
        }

        if let Some(max_retries) = parse_env::<u32>("BASELAUNCH_MAX_RETRIES")? {
            config.max_retries = max_retries;
        }

        if let Ok(prefix) = env::var("BASELAUNCH_STORAGE_PREFIX") {
            config.storage_prefix = prefix;
        }

        if let Ok(version) = env::var("BASELAUNCH_SCHEMA_VERSION") {
            config.schema_version = version;
        }

        if let Some(max_queue_len) = parse_env::<usize>("BASELAUNCH_MAX_QUEUE_LEN")? {
            config.max_queue_len = max_queue_len;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a `.env` file (if present) into the process environment, then
    /// read configuration with [`from_env`](Self::from_env).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the `.env` file is malformed or a
    /// numeric variable does not parse.
    #[cfg(feature = "env")]
    pub fn from_dotenv() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!(".env: {e}"))),
        }
        Self::from_env()
    }

    /// Check invariants that the type system does not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for an unparseable origin and
    /// [`Error::Config`] for zero-sized limits.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.origin)))?;
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        if self.max_queue_len == 0 {
            return Err(Error::Config("max_queue_len must be at least 1".into()));
        }
        if self.max_toasts == 0 {
            return Err(Error::Config("max_toasts must be at least 1".into()));
        }
        Ok(())
    }

    /// Merge this configuration with another, with the other taking precedence.
    ///
    /// A field in `other` only wins when it differs from the default.
    pub fn merge(mut self, other: ClientConfig) -> Self {
        let defaults = ClientConfig::default();

        if other.origin != defaults.origin {
            self.origin = other.origin;
        }
        if other.timeout != defaults.timeout {
            self.timeout = other.timeout;
        }
        if other.max_retries != defaults.max_retries {
            self.max_retries = other.max_retries;
        }
        if other.initial_backoff != defaults.initial_backoff {
            self.initial_backoff = other.initial_backoff;
        }
        if other.max_backoff != defaults.max_backoff {
            self.max_backoff = other.max_backoff;
        }
        self.default_headers.extend(other.default_headers);
        if other.storage_prefix != defaults.storage_prefix {
            self.storage_prefix = other.storage_prefix;
        }
        if other.schema_version != defaults.schema_version {
            self.schema_version = other.schema_version;
        }
        if other.retention != defaults.retention {
            self.retention = other.retention;
        }
        if other.max_queue_len != defaults.max_queue_len {
            self.max_queue_len = other.max_queue_len;
        }
        if other.toast_duration != defaults.toast_duration {
            self.toast_duration = other.toast_duration;
        }
        if other.max_toasts != defaults.max_toasts {
            self.max_toasts = other.max_toasts;
        }
        if other.live_retry_interval != defaults.live_retry_interval {
            self.live_retry_interval = other.live_retry_interval;
        }
        if other.live_max_retries != defaults.live_max_retries {
            self.live_max_retries = other.live_max_retries;
        }

        self
    }
}

#[cfg(feature = "env")]
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for creating ClientConfig with a fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the origin.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = origin.into();
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the first backoff delay.
    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.config.initial_backoff = delay;
        self
    }

    /// Set the backoff cap.
    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.config.max_backoff = delay;
        self
    }

    /// Add a default header.
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .insert(key.into(), value.into());
        self
    }

    /// Set the storage namespace.
    pub fn storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.storage_prefix = prefix.into();
        self
    }

    /// Set the schema version.
    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.config.schema_version = version.into();
        self
    }

    /// Set the storage retention window.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    /// Set the offline queue bound.
    pub fn max_queue_len(mut self, max_queue_len: usize) -> Self {
        self.config.max_queue_len = max_queue_len;
        self
    }

    /// Set the default toast duration.
    pub fn toast_duration(mut self, duration: Duration) -> Self {
        self.config.toast_duration = duration;
        self
    }

    /// Set the visible toast limit.
    pub fn max_toasts(mut self, max_toasts: usize) -> Self {
        self.config.max_toasts = max_toasts;
        self
    }

    /// Set the live-update reconnect policy.
    pub fn live_reconnect(mut self, interval: Duration, max_retries: u32) -> Self {
        self.config.live_retry_interval = interval;
        self.config.live_max_retries = max_retries;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

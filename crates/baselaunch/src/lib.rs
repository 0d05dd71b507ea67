//! # baselaunch
//!
//! Client runtime for the Base Launch app-discovery marketplace:
//! - Request pipeline with bearer auth, per-attempt timeouts, and exponential backoff
//! - Namespaced, schema-versioned key-value store
//! - Offline action queue replayed when connectivity returns
//! - Notification sink with an in-memory toast center
//! - Auth session, connectivity monitor, and a simulated live-update channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use baselaunch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = Runtime::builder()
//!         .config(ClientConfig::builder().origin("https://baselaunch.app").build())
//!         .build()?;
//!
//!     match runtime.client.get("/api/apps").await {
//!         ApiResult::Success { data } => println!("{data}"),
//!         ApiResult::Failure { error } => eprintln!("{error}"),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use client::{ApiClient, ApiClientBuilder, RequestExecutor, SessionExpiry};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result, StorageError};
pub use runtime::{BackgroundTasks, Runtime, RuntimeBuilder};
pub use types::*;

// Module declarations
pub mod auth;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod listeners;
pub mod live;
pub mod notify;
pub mod observability;
pub mod offline;
pub mod runtime;
pub mod storage;
pub mod types;
pub mod validation;

// Re-export key dependencies for convenience
pub use baselaunch_core::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use baselaunch_transport::{HttpTransport, ScriptedStep, ScriptedTransport, Transport};
pub use serde_json::Value as JsonValue;

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use baselaunch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ApiClient, ApiResult, ClientConfig, Error, Method, QueuedAction, RequestOptions, Result,
        Runtime,
        auth::{AuthEvent, AuthSession, UserProfile},
        connectivity::{ConnectivityEvent, ConnectivityMonitor},
        live::{LiveEvent, LiveUpdates},
        notify::{Notifier, Severity, ToastCenter},
        offline::{DrainOutcome, OfflineQueue},
        storage::{KeyValueStore, MemoryBackend, StorageBackend},
    };
}

/// Crate version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version stamped on every stored entry
pub const SCHEMA_VERSION: &str = "2.0.0";

/// Namespace prepended to every storage key
pub const STORAGE_PREFIX: &str = "base_launch_";

/// Default origin the pipeline resolves endpoints against
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Default per-attempt timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Reserved storage keys (without the namespace prefix)
pub mod keys {
    /// Cached app listings
    pub const APPS: &str = "apps";
    /// The user's saved app stack
    pub const USER_STACK: &str = "user_stack";
    /// Cached launches
    pub const LAUNCHES: &str = "launches";
    /// Cached cohorts
    pub const COHORTS: &str = "cohorts";
    /// Signed-in user's profile
    pub const USER_PROFILE: &str = "user_profile";
    /// Bearer credential
    pub const AUTH_TOKEN: &str = "auth_token";
    /// Referral codes issued to the user
    pub const REFERRAL_CODES: &str = "referral_codes";
    /// Pending analytics events
    pub const ANALYTICS_QUEUE: &str = "analytics_queue";
    /// Last successful sync timestamp
    pub const LAST_SYNC: &str = "last_sync";
    /// Offline action queue
    pub const OFFLINE_ACTIONS: &str = "offline_actions";
}

/// User-facing messages
pub mod messages {
    /// Connectivity failure
    pub const NETWORK_ERROR: &str = "Connection lost. Please check your internet connection.";
    /// Attempt deadline exceeded
    pub const TIMEOUT_ERROR: &str = "Request timed out. Please try again.";
    /// Credential rejected
    pub const AUTH_ERROR: &str = "Authentication failed. Please sign in again.";
    /// Input rejected by a validation rule
    pub const VALIDATION_ERROR: &str = "Please check your input and try again.";
    /// Store failure
    pub const STORAGE_ERROR: &str = "Local storage error. Please refresh the page.";
    /// Fallback
    pub const UNKNOWN_ERROR: &str = "Something went wrong. Please try again.";
    /// Shown when the pipeline drops an expired session
    pub const SESSION_EXPIRED: &str = "Session expired. Please sign in again.";
    /// Shown after quota recovery
    pub const STORAGE_FULL: &str = "Storage full. Cleared old data.";
}

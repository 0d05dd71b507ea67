//! Persistent key-value store
//!
//! Values are wrapped in a [`StoredEnvelope`] stamped with the write time and
//! the running schema version, serialized to JSON, and written under
//! `prefix + key` on a [`StorageBackend`]. Reads of entries written by another
//! schema version, or of entries that no longer parse, purge the entry and
//! fall back to the caller's default.
//!
//! # Examples
//!
//! ```rust
//! use baselaunch::storage::{KeyValueStore, MemoryBackend};
//! use baselaunch::ManualClock;
//! use std::sync::Arc;
//!
//! let store = KeyValueStore::new(Arc::new(MemoryBackend::new()), Arc::new(ManualClock::new()));
//! assert!(store.set("user_stack", &vec![1, 2, 3]));
//! assert_eq!(store.get("user_stack", Vec::<u32>::new()), vec![1, 2, 3]);
//! assert_eq!(store.get("missing", 0u32), 0);
//! ```

mod backend;
mod store;

pub use backend::{FileBackend, MemoryBackend};
pub use store::{KeyValueStore, AVAILABILITY_KEY, RETENTION, StoredEnvelope};

use crate::error::StorageError;

/// Durable string-to-string medium under the store.
///
/// Mirrors the browser `localStorage` surface: flat keys, string values,
/// and failures such as quota exhaustion reported per call.
pub trait StorageBackend: Send + Sync {
    /// Read the raw value under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write the raw value under `key`
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`; deleting a missing key succeeds
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored, including other namespaces
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

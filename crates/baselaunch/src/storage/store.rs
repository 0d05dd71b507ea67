use super::StorageBackend;
use crate::error::StorageError;
use crate::messages;
use crate::notify::SharedNotifier;
use crate::{SCHEMA_VERSION, STORAGE_PREFIX};
use baselaunch_core::clock::SharedClock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Key written and deleted once at construction to detect a usable backend.
pub const AVAILABILITY_KEY: &str = "__storage_test__";

/// Entries older than this are purged by [`KeyValueStore::clear_old_data`].
pub const RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// On-disk wrapper around every stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEnvelope<T> {
    /// The caller's value
    pub data: T,
    /// Write time, milliseconds since the UNIX epoch
    pub timestamp: u64,
    /// Schema version of the writer
    pub version: String,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    data: &'a T,
    timestamp: u64,
    version: &'a str,
}

/// Namespaced, schema-versioned key-value store.
///
/// Never returns errors: failed writes report `false`, failed reads return
/// the caller's default. When the backend fails the availability check at
/// construction, every operation is a no-op.
pub struct KeyValueStore {
    backend: Arc<dyn StorageBackend>,
    clock: SharedClock,
    notifier: Option<SharedNotifier>,
    prefix: String,
    version: String,
    retention: Duration,
    available: bool,
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("prefix", &self.prefix)
            .field("version", &self.version)
            .field("available", &self.available)
            .finish_non_exhaustive()
    }
}

impl KeyValueStore {
    /// Create a store over `backend`, probing it once.
    pub fn new(backend: Arc<dyn StorageBackend>, clock: SharedClock) -> Self {
        let available = check_available(backend.as_ref());
        if !available {
            tracing::warn!("storage backend unavailable; store operations disabled");
        }
        Self {
            backend,
            clock,
            notifier: None,
            prefix: STORAGE_PREFIX.to_string(),
            version: SCHEMA_VERSION.to_string(),
            retention: RETENTION,
            available,
        }
    }

    /// Use a different key namespace
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Use a different schema version
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Use a different retention window for [`clear_old_data`](Self::clear_old_data)
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Send quota-recovery warnings to `notifier`
    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Whether the availability check succeeded
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Key namespace
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Schema version stamped on writes
    pub fn schema_version(&self) -> &str {
        &self.version
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn namespaced_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix))
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "failed to list storage keys");
                Vec::new()
            }
        }
    }

    /// Store `value` under `key`.
    ///
    /// On quota exhaustion, entries past the retention window are purged and
    /// a warning is sent; the write itself still reports `false`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        if !self.available {
            return false;
        }

        let envelope = EnvelopeRef {
            data: value,
            timestamp: self.clock.now_millis(),
            version: &self.version,
        };
        let result = serde_json::to_string(&envelope)
            .map_err(StorageError::from)
            .and_then(|raw| self.backend.set_item(&self.full_key(key), &raw));

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "storage write failed");
                self.recover(&e);
                false
            }
        }
    }

    fn recover(&self, error: &StorageError) {
        if !error.is_quota_exceeded() {
            return;
        }
        let removed = self.clear_old_data();
        tracing::warn!(removed, "storage quota exceeded; purged old entries");
        if let Some(notifier) = &self.notifier {
            notifier.warning(messages::STORAGE_FULL);
        }
    }

    /// Read the value under `key`, or `None` if absent or unusable.
    ///
    /// Entries from another schema version and entries that are not a valid
    /// envelope are purged. An entry that is valid but does not decode as `T`
    /// is left in place.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.available {
            return None;
        }

        let full_key = self.full_key(key);
        let raw = match self.backend.get_item(&full_key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                tracing::error!(key, error = %e, "storage read failed");
                return None;
            }
        };

        match serde_json::from_str::<StoredEnvelope<Value>>(&raw) {
            Ok(envelope) if envelope.version != self.version => {
                tracing::debug!(
                    key,
                    stored = %envelope.version,
                    current = %self.version,
                    "discarding entry from another schema version"
                );
                self.remove(key);
                None
            }
            Ok(envelope) => match serde_json::from_value(envelope.data) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!(key, error = %e, "stored entry does not match requested type");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding corrupt storage entry");
                self.remove(key);
                None
            }
        }
    }

    /// Read the value under `key`, falling back to `default`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    /// Delete `key`. Returns `false` if the backend refused.
    pub fn remove(&self, key: &str) -> bool {
        if !self.available {
            return false;
        }
        match self.backend.remove_item(&self.full_key(key)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "storage removal failed");
                false
            }
        }
    }

    /// Delete every key in this store's namespace; other keys are untouched.
    pub fn clear(&self) -> bool {
        if !self.available {
            return false;
        }
        let mut ok = true;
        for key in self.namespaced_keys() {
            if let Err(e) = self.backend.remove_item(&key) {
                tracing::error!(key, error = %e, "storage clear failed");
                ok = false;
            }
        }
        ok
    }

    /// Whether `key` holds a current, non-null value.
    pub fn exists(&self, key: &str) -> bool {
        self.get_opt::<Value>(key).is_some_and(|v| !v.is_null())
    }

    /// Number of keys in this store's namespace.
    pub fn size(&self) -> usize {
        if !self.available {
            return 0;
        }
        self.namespaced_keys().len()
    }

    /// Purge namespaced entries older than the retention window, plus any
    /// that do not parse. Returns the number removed.
    pub fn clear_old_data(&self) -> usize {
        if !self.available {
            return 0;
        }
        let now = self.clock.now_millis();
        let max_age = u64::try_from(self.retention.as_millis()).unwrap_or(u64::MAX);

        let mut removed = 0;
        for key in self.namespaced_keys() {
            let stale = match self.backend.get_item(&key) {
                Ok(Some(raw)) => match serde_json::from_str::<StoredEnvelope<Value>>(&raw) {
                    Ok(envelope) => now.saturating_sub(envelope.timestamp) > max_age,
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(_) => true,
            };
            if stale && self.backend.remove_item(&key).is_ok() {
                removed += 1;
            }
        }
        tracing::debug!(removed, "cleared old storage entries");
        removed
    }

    /// Store several values; reports per-key success.
    pub fn set_batch<K, V, I>(&self, items: I) -> BTreeMap<String, bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        items
            .into_iter()
            .map(|(key, value)| {
                let key = key.into();
                let ok = self.set(&key, &value);
                (key, ok)
            })
            .collect()
    }

    /// Read several values as JSON; missing or unusable entries map to `None`.
    pub fn get_batch<I, K>(&self, keys: I) -> BTreeMap<String, Option<Value>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        keys.into_iter()
            .map(|key| {
                let key = key.into();
                let value = self.get_opt(&key);
                (key, value)
            })
            .collect()
    }

    /// Serialize every raw namespaced entry as a JSON object of full key to
    /// raw string, for backup.
    pub fn export(&self) -> String {
        if !self.available {
            return "{}".to_string();
        }
        let entries: BTreeMap<String, String> = self
            .namespaced_keys()
            .into_iter()
            .filter_map(|key| match self.backend.get_item(&key) {
                Ok(Some(raw)) => Some((key, raw)),
                _ => None,
            })
            .collect();
        serde_json::to_string(&entries).unwrap_or_else(|_| "{}".to_string())
    }

    /// Restore entries produced by [`export`](Self::export).
    ///
    /// Keys outside this store's namespace and non-string values are skipped.
    /// Returns `false` if `exported` is not a JSON object or a write fails.
    pub fn import(&self, exported: &str) -> bool {
        if !self.available {
            return false;
        }
        let entries: serde_json::Map<String, Value> = match serde_json::from_str(exported) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "storage import rejected");
                return false;
            }
        };

        for (key, value) in entries {
            if !key.starts_with(&self.prefix) {
                continue;
            }
            let Value::String(raw) = value else {
                continue;
            };
            if let Err(e) = self.backend.set_item(&key, &raw) {
                tracing::error!(key, error = %e, "storage import failed");
                return false;
            }
        }
        true
    }
}

fn check_available(backend: &dyn StorageBackend) -> bool {
    backend
        .set_item(AVAILABILITY_KEY, AVAILABILITY_KEY)
        .and_then(|()| backend.remove_item(AVAILABILITY_KEY))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Notifier, Severity, ToastCenter};
    use crate::storage::MemoryBackend;
    use baselaunch_core::clock::ManualClock;
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn store() -> (Arc<MemoryBackend>, ManualClock, KeyValueStore) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = ManualClock::starting_at(1_700_000_000_000);
        let store = KeyValueStore::new(backend.clone(), Arc::new(clock.clone()));
        (backend, clock, store)
    }

    #[test]
    fn test_envelope_format() {
        let (backend, _clock, store) = store();
        assert!(store.set("apps", &json!([{"id": 1}])));

        let raw = backend.get_item("base_launch_apps").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["data"], json!([{"id": 1}]));
        assert_eq!(value["timestamp"], 1_700_000_000_000u64);
        assert_eq!(value["version"], "2.0.0");
    }

    #[test]
    fn test_roundtrip_and_defaults() {
        let (_backend, _clock, store) = store();
        assert!(store.set("user_stack", &vec!["a", "b"]));
        assert_eq!(
            store.get("user_stack", Vec::<String>::new()),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(store.get("missing", 42u32), 42);
        assert!(store.exists("user_stack"));
        assert!(!store.exists("missing"));
    }

    #[test]
    fn test_version_mismatch_purges() {
        let (backend, _clock, store) = store();
        backend
            .set_item(
                "base_launch_apps",
                r#"{"data":[1],"timestamp":0,"version":"1.0.0"}"#,
            )
            .unwrap();

        assert_eq!(store.get("apps", Vec::<u32>::new()), Vec::<u32>::new());
        assert_eq!(backend.get_item("base_launch_apps").unwrap(), None);
    }

    #[test]
    fn test_corrupt_entry_purged() {
        let (backend, _clock, store) = store();
        backend.set_item("base_launch_apps", "{not json").unwrap();
        assert_eq!(store.get("apps", 7u8), 7);
        assert_eq!(backend.get_item("base_launch_apps").unwrap(), None);
    }

    #[test]
    fn test_mistyped_read_keeps_entry() {
        let (_backend, _clock, store) = store();
        assert!(store.set("apps", &json!([1, 2, 3])));

        assert_eq!(store.get("apps", 0u32), 0);
        assert!(store.exists("apps"));
        assert_eq!(store.get("apps", Vec::<u32>::new()), vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_and_size_respect_namespace() {
        let (backend, _clock, store) = store();
        backend.set_item("foreign", "keep me").unwrap();
        store.set("a", &1);
        store.set("b", &2);
        assert_eq!(store.size(), 2);

        assert!(store.clear());
        assert_eq!(store.size(), 0);
        assert_eq!(backend.get_item("foreign").unwrap().as_deref(), Some("keep me"));
    }

    #[test]
    fn test_clear_old_data() {
        let (backend, clock, store) = store();
        store.set("old", &"x");
        clock.advance(DAY * 20);
        store.set("recent", &"y");
        backend.set_item("base_launch_broken", "garbage").unwrap();
        clock.advance(DAY * 11);

        assert_eq!(store.clear_old_data(), 2);
        assert!(!store.exists("old"));
        assert!(store.exists("recent"));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_quota_recovery_warns_and_returns_false() {
        let backend = Arc::new(MemoryBackend::with_quota(160));
        let clock = ManualClock::starting_at(0);
        let shared_clock: SharedClock = Arc::new(clock.clone());
        let toasts = Arc::new(ToastCenter::new(shared_clock.clone()));
        let store =
            KeyValueStore::new(backend.clone(), shared_clock).with_notifier(toasts.clone());

        assert!(store.set("stale", &"x".repeat(40)));
        clock.advance(DAY * 31);

        assert!(!store.set("big", &"y".repeat(120)));
        assert!(!store.exists("stale"));

        let active = toasts.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Storage full. Cleared old data.");
        assert_eq!(active[0].severity, Severity::Warning);

        assert!(store.set("big", &"y".repeat(60)));
    }

    #[test]
    fn test_unavailable_backend_is_noop() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_unavailable(true);
        let store = KeyValueStore::new(backend.clone(), Arc::new(ManualClock::starting_at(0)));
        assert!(!store.is_available());

        backend.set_unavailable(false);
        assert!(!store.set("a", &1));
        assert_eq!(store.get("a", 0), 0);
        assert_eq!(store.size(), 0);
        assert!(!store.remove("a"));
        assert_eq!(backend.keys().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_availability_check_leaves_no_trace() {
        let (backend, _clock, _store) = store();
        assert_eq!(backend.get_item(AVAILABILITY_KEY).unwrap(), None);
    }

    #[test]
    fn test_batch_operations() {
        let (_backend, _clock, store) = store();
        let results = store.set_batch([("a", json!(1)), ("b", json!({"x": true}))]);
        assert_eq!(results.get("a"), Some(&true));
        assert_eq!(results.get("b"), Some(&true));

        let values = store.get_batch(["a", "b", "c"]);
        assert_eq!(values["a"], Some(json!(1)));
        assert_eq!(values["b"], Some(json!({"x": true})));
        assert_eq!(values["c"], None);
    }

    #[test]
    fn test_export_import() {
        let (backend, _clock, store) = store();
        store.set("apps", &json!([1, 2]));
        backend.set_item("foreign", "nope").unwrap();
        let exported = store.export();

        let (target_backend, _clock2, target) = self::store();
        let mut doc: serde_json::Map<String, Value> = serde_json::from_str(&exported).unwrap();
        assert!(!doc.contains_key("foreign"));
        doc.insert("foreign".into(), json!("ignored"));
        doc.insert("base_launch_number".into(), json!(5));

        assert!(target.import(&Value::Object(doc).to_string()));
        assert_eq!(target.get("apps", json!(null)), json!([1, 2]));
        assert_eq!(target_backend.get_item("foreign").unwrap(), None);
        assert_eq!(target_backend.get_item("base_launch_number").unwrap(), None);

        assert!(!target.import("[1,2,3]"));
        assert!(!target.import("not json"));
    }

    #[test]
    fn test_custom_prefix_and_version() {
        let backend = Arc::new(MemoryBackend::new());
        let clock: SharedClock = Arc::new(ManualClock::starting_at(0));
        let old = KeyValueStore::new(backend.clone(), clock.clone()).with_schema_version("1.0.0");
        old.set("profile", &"legacy");

        let current = KeyValueStore::new(backend.clone(), clock.clone());
        assert_eq!(current.get("profile", String::new()), "");

        let other = KeyValueStore::new(backend.clone(), clock).with_prefix("other_");
        other.set("profile", &"mine");
        assert_eq!(other.size(), 1);
        assert_eq!(current.size(), 0);
    }

    #[test]
    fn test_notifier_trait_object_is_used() {
        let clock: SharedClock = Arc::new(ManualClock::starting_at(0));
        let toasts = Arc::new(ToastCenter::new(clock.clone()));
        let notifier: SharedNotifier = toasts.clone();
        notifier.info("hello");
        assert_eq!(toasts.len(), 1);
    }
}

//! Offline action queue
//!
//! Mutations attempted while offline are persisted under the
//! `offline_actions` key and replayed, oldest first, once connectivity
//! returns. A drain always empties the queue: entries that fail on replay
//! are logged and dropped, not re-queued.

use crate::client::RequestExecutor;
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::config::DEFAULT_MAX_QUEUE_LEN;
use crate::keys;
use crate::listeners::panic_message;
use crate::notify::SharedNotifier;
use crate::storage::KeyValueStore;
use crate::types::{ApiResult, QueuedAction, RequestOptions, random_base36};
use baselaunch_core::clock::SharedClock;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

/// Replay result for one queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainOutcome {
    /// The action that was replayed
    #[serde(flatten)]
    pub action: QueuedAction,
    /// What the pipeline returned
    pub result: ApiResult<Value>,
}

/// Persistent FIFO of requests waiting for connectivity.
pub struct OfflineQueue {
    store: Arc<KeyValueStore>,
    clock: SharedClock,
    connectivity: Arc<ConnectivityMonitor>,
    notifier: Option<SharedNotifier>,
    max_len: usize,
    // Serializes read-modify-write cycles on the stored queue.
    guard: Mutex<()>,
}

impl OfflineQueue {
    /// Create a queue persisted in `store`.
    pub fn new(
        store: Arc<KeyValueStore>,
        clock: SharedClock,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            store,
            clock,
            connectivity,
            notifier: None,
            max_len: DEFAULT_MAX_QUEUE_LEN,
            guard: Mutex::new(()),
        }
    }

    /// Report completed drains to `notifier`
    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Keep at most `max_len` actions; older ones are dropped first.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    /// Append an action and persist the queue.
    pub async fn enqueue(&self, endpoint: &str, options: RequestOptions) -> QueuedAction {
        let _guard = self.guard.lock().await;

        let action = QueuedAction {
            endpoint: endpoint.to_string(),
            options,
            timestamp: self.clock.now_millis(),
            id: random_base36(9),
        };

        let mut queue = self.load();
        queue.push(action.clone());
        if queue.len() > self.max_len {
            let overflow = queue.len() - self.max_len;
            for dropped in queue.drain(..overflow) {
                tracing::warn!(
                    id = %dropped.id,
                    endpoint = %dropped.endpoint,
                    max_len = self.max_len,
                    "offline queue full; dropping oldest action"
                );
            }
        }

        if !self.store.set(keys::OFFLINE_ACTIONS, &queue) {
            tracing::warn!(id = %action.id, "offline action not persisted");
        }
        tracing::debug!(id = %action.id, endpoint, queued = queue.len(), "queued offline action");
        action
    }

    /// Replay every queued action through `executor`, then clear the queue.
    ///
    /// Returns `None` without touching the queue when offline or when there
    /// is nothing to replay. A replay that panics is logged and left out of
    /// the returned outcomes.
    pub async fn drain(&self, executor: &dyn RequestExecutor) -> Option<Vec<DrainOutcome>> {
        if !self.connectivity.is_online() {
            tracing::debug!("offline; skipping queue drain");
            return None;
        }

        let _guard = self.guard.lock().await;
        let queue = self.load();
        if queue.is_empty() {
            return None;
        }
        tracing::info!(queued = queue.len(), "draining offline queue");

        let mut outcomes = Vec::with_capacity(queue.len());
        for action in queue {
            let replay = executor.execute(&action.endpoint, action.options.clone());
            match AssertUnwindSafe(replay).catch_unwind().await {
                Ok(result) => {
                    if let Some(error) = result.error() {
                        tracing::warn!(
                            id = %action.id,
                            endpoint = %action.endpoint,
                            error,
                            "offline action failed; dropping"
                        );
                    }
                    outcomes.push(DrainOutcome { action, result });
                }
                Err(payload) => {
                    tracing::error!(
                        id = %action.id,
                        endpoint = %action.endpoint,
                        panic = %panic_message(payload.as_ref()),
                        "offline action replay panicked"
                    );
                }
            }
        }

        self.store.remove(keys::OFFLINE_ACTIONS);

        if !outcomes.is_empty()
            && let Some(notifier) = &self.notifier
        {
            notifier.success(&format!("Synced {} offline actions", outcomes.len()));
        }
        Some(outcomes)
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.load().len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of queued actions, oldest first
    pub fn pending(&self) -> Vec<QueuedAction> {
        self.load()
    }

    /// Drain through `executor` on every offline-to-online transition.
    ///
    /// The subscription is taken before this returns, so a transition that
    /// happens right after the call is not missed.
    pub fn spawn_sync_on_reconnect(
        self: &Arc<Self>,
        executor: Arc<dyn RequestExecutor>,
    ) -> JoinHandle<()> {
        let mut events = self.connectivity.subscribe();
        let queue = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectivityEvent::Online) => {
                        if let Some(outcomes) = queue.drain(executor.as_ref()).await {
                            tracing::info!(replayed = outcomes.len(), "offline queue synced");
                        }
                    }
                    Ok(ConnectivityEvent::Offline) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "connectivity events lagged");
                        if queue.connectivity.is_online() {
                            queue.drain(executor.as_ref()).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn load(&self) -> Vec<QueuedAction> {
        self.store.get(keys::OFFLINE_ACTIONS, Vec::new())
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastCenter;
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use baselaunch_core::clock::ManualClock;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    /// Records endpoints; panics on `/panic`, fails on `/fail`.
    #[derive(Default)]
    struct Recorder {
        calls: SyncMutex<Vec<String>>,
    }

    #[async_trait]
    impl RequestExecutor for Recorder {
        async fn execute(&self, endpoint: &str, _options: RequestOptions) -> ApiResult<Value> {
            self.calls.lock().push(endpoint.to_string());
            match endpoint {
                "/panic" => panic!("replay exploded"),
                "/fail" => ApiResult::failure("HTTP 500: Internal Server Error"),
                _ => ApiResult::success(json!({"ok": true})),
            }
        }
    }

    struct Fixture {
        queue: Arc<OfflineQueue>,
        store: Arc<KeyValueStore>,
        connectivity: Arc<ConnectivityMonitor>,
        toasts: Arc<ToastCenter>,
    }

    fn fixture(max_len: usize) -> Fixture {
        let clock: SharedClock = Arc::new(ManualClock::starting_at(42));
        let store = Arc::new(KeyValueStore::new(
            Arc::new(MemoryBackend::new()),
            clock.clone(),
        ));
        let connectivity = Arc::new(ConnectivityMonitor::new(false));
        let toasts = Arc::new(ToastCenter::new(clock.clone()));
        let queue = Arc::new(
            OfflineQueue::new(store.clone(), clock, connectivity.clone())
                .with_notifier(toasts.clone())
                .with_max_len(max_len),
        );
        Fixture {
            queue,
            store,
            connectivity,
            toasts,
        }
    }

    #[tokio::test]
    async fn test_enqueue_persists_action() {
        let f = fixture(10);
        let action = f.queue.enqueue("/api/stack", RequestOptions::get()).await;

        assert_eq!(action.timestamp, 42);
        assert_eq!(action.id.len(), 9);
        assert!(f.store.exists(keys::OFFLINE_ACTIONS));
        assert_eq!(f.queue.pending(), vec![action]);
    }

    #[tokio::test]
    async fn test_drain_skipped_while_offline() {
        let f = fixture(10);
        f.queue.enqueue("/a", RequestOptions::get()).await;

        let recorder = Recorder::default();
        assert!(f.queue.drain(&recorder).await.is_none());
        assert_eq!(f.queue.len(), 1);
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_drain_empty_queue_is_none() {
        let f = fixture(10);
        f.connectivity.set_online(true);
        assert!(f.queue.drain(&Recorder::default()).await.is_none());
        assert!(f.toasts.is_empty());
    }

    #[tokio::test]
    async fn test_drain_replays_fifo_and_clears() {
        let f = fixture(10);
        for endpoint in ["/a", "/fail", "/panic", "/c"] {
            f.queue.enqueue(endpoint, RequestOptions::get()).await;
        }
        f.connectivity.set_online(true);

        let recorder = Recorder::default();
        let outcomes = f.queue.drain(&recorder).await.unwrap();

        assert_eq!(*recorder.calls.lock(), vec!["/a", "/fail", "/panic", "/c"]);
        let replayed: Vec<&str> = outcomes.iter().map(|o| o.action.endpoint.as_str()).collect();
        assert_eq!(replayed, vec!["/a", "/fail", "/c"]);
        assert!(!outcomes[1].result.is_success());

        assert!(f.queue.is_empty());
        assert!(!f.store.exists(keys::OFFLINE_ACTIONS));
        assert_eq!(f.toasts.active()[0].message, "Synced 3 offline actions");
    }

    #[tokio::test]
    async fn test_bound_drops_oldest() {
        let f = fixture(2);
        f.queue.enqueue("/1", RequestOptions::get()).await;
        f.queue.enqueue("/2", RequestOptions::get()).await;
        f.queue.enqueue("/3", RequestOptions::get()).await;

        let endpoints: Vec<String> = f.queue.pending().into_iter().map(|a| a.endpoint).collect();
        assert_eq!(endpoints, vec!["/2", "/3"]);
    }

    #[tokio::test]
    async fn test_reconnect_triggers_drain() {
        let f = fixture(10);
        f.queue.enqueue("/a", RequestOptions::get()).await;

        let recorder = Arc::new(Recorder::default());
        let handle = f.queue.spawn_sync_on_reconnect(recorder.clone());
        f.connectivity.set_online(true);

        for _ in 0..50 {
            if f.queue.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*recorder.calls.lock(), vec!["/a"]);
        assert!(f.queue.is_empty());
        handle.abort();
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = DrainOutcome {
            action: QueuedAction {
                endpoint: "/a".into(),
                options: RequestOptions::get(),
                timestamp: 1,
                id: "abc".into(),
            },
            result: ApiResult::success(json!(1)),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["endpoint"], "/a");
        assert_eq!(value["result"]["outcome"], "success");
    }
}

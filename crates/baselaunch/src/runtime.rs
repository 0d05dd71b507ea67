//! Runtime assembly
//!
//! [`Runtime`] builds every component from one [`ClientConfig`] and shares a
//! single clock, store, notifier, and connectivity monitor between them.

use crate::auth::AuthSession;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;
use crate::live::{LiveLink, LiveUpdates};
use crate::notify::{SharedNotifier, ToastCenter};
use crate::storage::{KeyValueStore, MemoryBackend, StorageBackend};
use baselaunch_core::clock::{SharedClock, SystemClock};
use baselaunch_transport::Transport;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Every client-side service, wired together.
///
/// # Example
///
/// ```rust,no_run
/// use baselaunch::{ClientConfig, Runtime};
///
/// # async fn example() -> baselaunch::Result<()> {
/// let runtime = Runtime::builder()
///     .config(ClientConfig::builder().origin("https://baselaunch.app").build())
///     .build()?;
/// let _tasks = runtime.start();
///
/// runtime.connectivity.set_online(false);
/// // ...mutations are queued...
/// runtime.connectivity.set_online(true); // the queue drains in the background
/// # Ok(())
/// # }
/// ```
pub struct Runtime {
    /// Configuration every component was built from
    pub config: ClientConfig,
    /// Shared time source
    pub clock: SharedClock,
    /// Namespaced, versioned store
    pub store: Arc<KeyValueStore>,
    /// In-memory toast stack
    pub toasts: Arc<ToastCenter>,
    /// Where user-facing messages go; the toast stack unless overridden
    pub notifier: SharedNotifier,
    /// Online/offline state
    pub connectivity: Arc<ConnectivityMonitor>,
    /// Signed-in user and credential
    pub auth: Arc<AuthSession>,
    /// Request pipeline and offline queue
    pub client: Arc<ApiClient>,
    /// Live-update channel
    pub live: Arc<LiveUpdates>,
}

impl Runtime {
    /// Create a builder with default configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Build a runtime from `BASELAUNCH_*` environment variables (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid values.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        Self::builder().config(ClientConfig::from_dotenv()?).build()
    }

    /// Spawn the background tasks: queue sync on reconnect and live updates
    /// following connectivity.
    ///
    /// If already online, the live channel is connected right away.
    pub fn start(&self) -> BackgroundTasks {
        let mut handles = vec![
            self.client.spawn_offline_sync(),
            self.live.follow_connectivity(&self.connectivity),
        ];

        if self.connectivity.is_online() {
            let live = Arc::clone(&self.live);
            handles.push(tokio::spawn(async move {
                if let Err(e) = live.connect().await {
                    tracing::warn!(error = %e, "live updates unavailable");
                }
            }));
        }

        tracing::info!(origin = %self.config.origin, "runtime started");
        BackgroundTasks { handles }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("client", &self.client)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

/// Handles to the tasks spawned by [`Runtime::start`].
///
/// Dropping this aborts them.
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Abort every task.
    pub fn shutdown(mut self) {
        self.abort_all();
    }

    /// Number of tasks still running
    pub fn running(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// Builder for [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: ClientConfig,
    clock: Option<SharedClock>,
    transport: Option<Arc<dyn Transport>>,
    backend: Option<Arc<dyn StorageBackend>>,
    notifier: Option<SharedNotifier>,
    live_link: Option<Arc<dyn LiveLink>>,
    offline: bool,
}

impl RuntimeBuilder {
    /// Use `config` for every component.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `clock` instead of the system clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `transport` instead of a fresh HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist into `backend` instead of memory.
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Send user-facing messages to `notifier` instead of the toast stack.
    pub fn notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use `link` for the live-update channel.
    pub fn live_link(mut self, link: Arc<dyn LiveLink>) -> Self {
        self.live_link = Some(link);
        self
    }

    /// Start in the offline state.
    pub fn start_offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Build the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the default HTTP
    /// transport cannot be created.
    pub fn build(self) -> Result<Runtime> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let toasts = Arc::new(ToastCenter::with_limits(
            clock.clone(),
            config.max_toasts,
            config.toast_duration,
        ));
        let notifier = self.notifier.unwrap_or_else(|| toasts.clone());

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let store = Arc::new(
            KeyValueStore::new(backend, clock.clone())
                .with_prefix(config.storage_prefix.clone())
                .with_schema_version(config.schema_version.clone())
                .with_retention(config.retention)
                .with_notifier(notifier.clone()),
        );

        let connectivity = Arc::new(ConnectivityMonitor::new(!self.offline));
        let auth = Arc::new(AuthSession::new(store.clone()).with_notifier(notifier.clone()));

        let mut client = ApiClient::builder()
            .config(config.clone())
            .store(store.clone())
            .clock(clock.clone())
            .notifier(notifier.clone())
            .connectivity(connectivity.clone())
            .session(auth.clone());
        if let Some(transport) = self.transport {
            client = client.transport(transport);
        }
        let client = Arc::new(client.build()?);

        let mut live = LiveUpdates::new(clock.clone())
            .with_reconnect(config.live_retry_interval, config.live_max_retries)
            .with_notifier(notifier.clone());
        if let Some(link) = self.live_link {
            live = live.with_link(link);
        }

        Ok(Runtime {
            config,
            clock,
            store,
            toasts,
            notifier,
            connectivity,
            auth,
            client,
            live: Arc::new(live),
        })
    }
}

//! Live-update channel
//!
//! A push channel for marketplace metrics and app/launch updates. The wire
//! side is abstracted behind [`LiveLink`]; [`SimulatedLink`] stands in until
//! a real socket exists. Connection failures are retried on a linear
//! schedule (`interval * retry_count`) driven by the runtime clock.

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::error::{Error, Result};
use crate::listeners::{ListenerRegistry, ListenerResult, Subscription};
use crate::notify::SharedNotifier;
use baselaunch_core::clock::SharedClock;
use baselaunch_core::retry::{BackoffStrategy, LinearBackoff};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Event delivered to live-update listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LiveEvent {
    /// The channel opened
    Connected {
        /// When, in epoch milliseconds
        timestamp: u64,
    },
    /// The channel was closed
    Disconnected {
        /// When, in epoch milliseconds
        timestamp: u64,
    },
    /// Marketplace totals changed
    MetricsUpdate {
        /// Listed apps
        total_apps: u32,
        /// Launches in progress
        active_launches: u32,
        /// Registered developers
        developers: u32,
        /// When, in epoch milliseconds
        timestamp: u64,
    },
    /// Something happened to an app
    AppUpdate {
        /// Update kind, e.g. `new_app` or `rating_update`
        #[serde(rename = "type")]
        kind: String,
        /// Affected app
        app_id: u64,
        /// Kind-specific payload
        data: Value,
        /// When, in epoch milliseconds
        timestamp: u64,
    },
    /// Something happened to a launch
    LaunchUpdate {
        /// Update kind, e.g. `waitlist_milestone` or `cohort_formed`
        #[serde(rename = "type")]
        kind: String,
        /// Affected launch
        launch_id: u64,
        /// Kind-specific payload
        data: Value,
        /// When, in epoch milliseconds
        timestamp: u64,
    },
    /// Acknowledgement of a [`LiveUpdates::send`]
    Response {
        /// Whether the payload was accepted
        success: bool,
        /// The `id` field of the sent payload, if any
        request_id: Option<Value>,
        /// When, in epoch milliseconds
        timestamp: u64,
    },
    /// Reconnecting gave up
    MaxRetriesExceeded {
        /// Last connection error
        error: String,
    },
}

/// Wire side of the live channel.
pub trait LiveLink: Send + Sync {
    /// Open the connection.
    fn open(&self) -> std::result::Result<(), String>;

    /// Transmit a payload on an open connection.
    fn send(&self, payload: &Value) -> std::result::Result<(), String>;
}

/// Link that always connects and accepts every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedLink;

impl LiveLink for SimulatedLink {
    fn open(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    fn send(&self, payload: &Value) -> std::result::Result<(), String> {
        tracing::debug!(%payload, "simulated live send");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    // A connect loop owns the retry counter.
    connecting: bool,
    retry_count: u32,
    // Bumped by `disconnect` so a pending reconnect knows to stand down.
    epoch: u64,
}

/// Marks a connect loop as in flight for `epoch`; released on drop.
struct InFlight<'a> {
    state: &'a Mutex<LinkState>,
    epoch: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.epoch == self.epoch {
            state.connecting = false;
        }
    }
}

/// Live-update channel with reconnect policy.
pub struct LiveUpdates {
    link: Arc<dyn LiveLink>,
    clock: SharedClock,
    notifier: Option<SharedNotifier>,
    backoff: LinearBackoff,
    state: Mutex<LinkState>,
    listeners: ListenerRegistry<LiveEvent>,
}

impl LiveUpdates {
    /// Channel over [`SimulatedLink`] retrying every 5 s, at most 5 times.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            link: Arc::new(SimulatedLink),
            clock,
            notifier: None,
            backoff: LinearBackoff::new(Duration::from_secs(5), 5),
            state: Mutex::new(LinkState::default()),
            listeners: ListenerRegistry::new("live"),
        }
    }

    /// Use `link` for the wire side
    pub fn with_link(mut self, link: Arc<dyn LiveLink>) -> Self {
        self.link = link;
        self
    }

    /// Wait `interval * n` before the n-th reconnect; give up after `max_retries`.
    pub fn with_reconnect(mut self, interval: Duration, max_retries: u32) -> Self {
        self.backoff = LinearBackoff::new(interval, max_retries);
        self
    }

    /// Send connection status toasts to `notifier`
    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Whether the channel is open
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Reconnect attempts since the last successful connection
    pub fn retry_count(&self) -> u32 {
        self.state.lock().retry_count
    }

    /// Open the channel, retrying failures on the linear schedule.
    ///
    /// Returns immediately if already connected or if another connect loop
    /// is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] once the retry budget is spent (after
    /// emitting [`LiveEvent::MaxRetriesExceeded`]) or when [`disconnect`]
    /// is called while a reconnect is pending.
    ///
    /// [`disconnect`]: Self::disconnect
    pub async fn connect(&self) -> Result<()> {
        let in_flight = {
            let mut state = self.state.lock();
            if state.connected {
                return Ok(());
            }
            if state.connecting {
                tracing::debug!("connect already in flight");
                return Ok(());
            }
            state.connecting = true;
            InFlight {
                state: &self.state,
                epoch: state.epoch,
            }
        };
        self.open_with_retries(&in_flight).await
    }

    async fn open_with_retries(&self, in_flight: &InFlight<'_>) -> Result<()> {
        let epoch = in_flight.epoch;
        loop {
            match self.link.open() {
                Ok(()) => {
                    {
                        let mut state = self.state.lock();
                        if state.epoch != epoch {
                            return Err(Error::Network("connection attempt cancelled".into()));
                        }
                        state.connected = true;
                        state.retry_count = 0;
                    }
                    tracing::info!("live updates connected");
                    self.emit(&LiveEvent::Connected {
                        timestamp: self.clock.now_millis(),
                    });
                    if let Some(notifier) = &self.notifier {
                        notifier.success("Connected to live updates");
                    }
                    return Ok(());
                }
                Err(reason) => {
                    let Some(delay) = self.handle_connection_error(&reason) else {
                        return Err(Error::Network(reason));
                    };
                    self.clock.sleep(delay).await;
                    if self.state.lock().epoch != epoch {
                        tracing::debug!("reconnect cancelled by disconnect");
                        return Err(Error::Network("connection attempt cancelled".into()));
                    }
                }
            }
        }
    }

    /// An open connection dropped; reconnect on the linear schedule.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn connection_lost(&self, reason: &str) -> Result<()> {
        let in_flight = {
            let mut state = self.state.lock();
            state.connected = false;
            if state.connecting {
                None
            } else {
                state.connecting = true;
                Some(InFlight {
                    state: &self.state,
                    epoch: state.epoch,
                })
            }
        };
        tracing::warn!(reason, "live connection lost");
        let Some(in_flight) = in_flight else {
            tracing::debug!("reconnect already in flight");
            return Ok(());
        };
        let epoch = in_flight.epoch;

        let Some(delay) = self.handle_connection_error(reason) else {
            return Err(Error::Network(reason.to_string()));
        };
        self.clock.sleep(delay).await;
        if self.state.lock().epoch != epoch {
            return Err(Error::Network("connection attempt cancelled".into()));
        }
        self.open_with_retries(&in_flight).await
    }

    /// Close the channel and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.connecting = false;
            std::mem::replace(&mut state.connected, false)
        };
        if was_connected {
            tracing::info!("live updates disconnected");
            self.emit(&LiveEvent::Disconnected {
                timestamp: self.clock.now_millis(),
            });
        }
    }

    /// Transmit `payload` and emit a [`LiveEvent::Response`] for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] when the channel is not connected or the
    /// link rejects the payload.
    pub fn send(&self, payload: &Value) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Network("live updates not connected".into()));
        }
        self.link.send(payload).map_err(Error::Network)?;
        self.emit(&LiveEvent::Response {
            success: true,
            request_id: payload.get("id").cloned(),
            timestamp: self.clock.now_millis(),
        });
        Ok(())
    }

    /// Register a listener for every live event.
    pub fn on<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LiveEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Deliver `event` to listeners. Returns the number that failed.
    pub fn emit(&self, event: &LiveEvent) -> usize {
        self.listeners.emit(event)
    }

    /// Connect when the device comes online and disconnect when it goes offline.
    pub fn follow_connectivity(self: &Arc<Self>, monitor: &ConnectivityMonitor) -> JoinHandle<()> {
        let mut events = monitor.subscribe();
        let live = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectivityEvent::Online) => {
                        let live = Arc::clone(&live);
                        tokio::spawn(async move {
                            if let Err(e) = live.connect().await {
                                tracing::warn!(error = %e, "live updates unavailable");
                            }
                        });
                    }
                    Ok(ConnectivityEvent::Offline) => live.disconnect(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "connectivity events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Count a failure. Returns the delay before the next attempt, or `None`
    /// when the budget is spent.
    fn handle_connection_error(&self, reason: &str) -> Option<Duration> {
        let max = self.backoff.max_retries();
        let retry = {
            let mut state = self.state.lock();
            state.connected = false;
            if state.retry_count < max {
                state.retry_count += 1;
                Some(state.retry_count)
            } else {
                state.retry_count = 0;
                None
            }
        };

        match retry {
            Some(n) => {
                tracing::warn!(reason, retry = n, max, "live connection failed; retrying");
                if let Some(notifier) = &self.notifier {
                    notifier.warning(&format!("Connection lost. Retrying... ({n}/{max})"));
                }
                Some(self.backoff.next_delay(n - 1).unwrap_or_default())
            }
            None => {
                tracing::error!(reason, max, "live connection retries exhausted");
                if let Some(notifier) = &self.notifier {
                    notifier.error("Unable to connect to live updates");
                }
                self.emit(&LiveEvent::MaxRetriesExceeded {
                    error: reason.to_string(),
                });
                None
            }
        }
    }
}

impl std::fmt::Debug for LiveUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveUpdates")
            .field("connected", &self.is_connected())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

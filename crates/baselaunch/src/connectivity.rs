//! Connectivity monitor
//!
//! Tracks whether the device is online and broadcasts transitions. Events
//! are edge-triggered: setting the state it already has emits nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// Went from offline to online
    Online,
    /// Went from online to offline
    Offline,
}

/// Current online state plus a broadcast of transitions.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state
    pub fn new(online: bool) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            online: AtomicBool::new(online),
            events,
        }
    }

    /// Whether the device is currently online
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record the current state. Returns `true` if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        let event = if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        tracing::info!(?event, "connectivity changed");
        // No receivers is fine.
        let _ = self.events.send(event);
        true
    }

    /// Receive future transitions
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

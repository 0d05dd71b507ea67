//! Notification sink
//!
//! The runtime surfaces user-facing messages (session expiry, queue sync,
//! storage recovery, live-update status) through the [`Notifier`] trait.
//! [`ToastCenter`] keeps them in memory for a UI to render;
//! [`TracingNotifier`] just logs them.

use crate::types::random_base36;
use baselaunch_core::clock::SharedClock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Display time used when the caller does not pick one.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(5_000);

/// Maximum number of toasts shown at once.
pub const DEFAULT_MAX_TOASTS: usize = 5;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Operation completed
    Success,
    /// Operation failed
    Error,
    /// Degraded but recoverable
    Warning,
    /// Informational
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// Opaque notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Borrow as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier returned by [`Notifier::notify`]
    pub id: NotificationId,
    /// Text shown to the user
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// How long it stays visible; `None` means until dismissed
    pub duration: Option<Duration>,
    /// Creation time, milliseconds since the UNIX epoch
    pub created_at: u64,
}

impl Notification {
    /// Whether the notification has outlived its duration at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.duration {
            Some(d) => now >= self.created_at.saturating_add(millis(d)),
            None => false,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Resolve the caller's duration: `None` is the default, zero is persistent.
pub fn effective_duration(duration: Option<Duration>, default: Duration) -> Option<Duration> {
    match duration {
        None => Some(default),
        Some(d) if d.is_zero() => None,
        Some(d) => Some(d),
    }
}

/// Destination for user-facing messages.
pub trait Notifier: Send + Sync {
    /// Show `message`.
    ///
    /// `duration` of `None` uses the default (5 s); a zero duration keeps the
    /// notification until it is dismissed.
    fn notify(&self, message: &str, severity: Severity, duration: Option<Duration>)
    -> NotificationId;

    /// Success notification with the default duration
    fn success(&self, message: &str) -> NotificationId {
        self.notify(message, Severity::Success, None)
    }

    /// Error notification with the default duration
    fn error(&self, message: &str) -> NotificationId {
        self.notify(message, Severity::Error, None)
    }

    /// Warning notification with the default duration
    fn warning(&self, message: &str) -> NotificationId {
        self.notify(message, Severity::Warning, None)
    }

    /// Info notification with the default duration
    fn info(&self, message: &str) -> NotificationId {
        self.notify(message, Severity::Info, None)
    }
}

/// Shared, dynamically dispatched notifier handle.
pub type SharedNotifier = Arc<dyn Notifier>;

/// In-memory toast stack.
///
/// Holds at most `max_visible` notifications; adding one more evicts the
/// oldest. Expired toasts are removed by [`ToastCenter::expire`].
pub struct ToastCenter {
    clock: SharedClock,
    max_visible: usize,
    default_duration: Duration,
    toasts: Mutex<VecDeque<Notification>>,
}

impl ToastCenter {
    /// Create a toast center with the default limits.
    pub fn new(clock: SharedClock) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_TOASTS, DEFAULT_DURATION)
    }

    /// Create a toast center with custom limits.
    pub fn with_limits(clock: SharedClock, max_visible: usize, default_duration: Duration) -> Self {
        Self {
            clock,
            max_visible: max_visible.max(1),
            default_duration,
            toasts: Mutex::new(VecDeque::new()),
        }
    }

    /// Remove a toast. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: &NotificationId) -> bool {
        let mut toasts = self.toasts.lock();
        let before = toasts.len();
        toasts.retain(|t| &t.id != id);
        toasts.len() != before
    }

    /// Remove every toast.
    pub fn clear(&self) {
        self.toasts.lock().clear();
    }

    /// Visible toasts, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        self.toasts.lock().iter().cloned().collect()
    }

    /// Number of visible toasts.
    pub fn len(&self) -> usize {
        self.toasts.lock().len()
    }

    /// Whether nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.toasts.lock().is_empty()
    }

    /// Drop toasts whose duration has elapsed according to the clock.
    pub fn expire(&self) -> usize {
        self.expire_at(self.clock.now_millis())
    }

    /// Drop toasts whose duration has elapsed at `now`.
    pub fn expire_at(&self, now: u64) -> usize {
        let mut toasts = self.toasts.lock();
        let before = toasts.len();
        toasts.retain(|t| !t.is_expired(now));
        before - toasts.len()
    }
}

impl Notifier for ToastCenter {
    fn notify(
        &self,
        message: &str,
        severity: Severity,
        duration: Option<Duration>,
    ) -> NotificationId {
        let now = self.clock.now_millis();
        let notification = Notification {
            id: NotificationId(format!("toast_{now}_{}", random_base36(9))),
            message: message.to_string(),
            severity,
            duration: effective_duration(duration, self.default_duration),
            created_at: now,
        };
        let id = notification.id.clone();

        let mut toasts = self.toasts.lock();
        while toasts.len() >= self.max_visible {
            toasts.pop_front();
        }
        toasts.push_back(notification);
        id
    }
}

/// Notifier that writes every message to the `tracing` log.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    seq: AtomicU64,
}

impl TracingNotifier {
    /// Create a new logging notifier
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for TracingNotifier {
    fn notify(
        &self,
        message: &str,
        severity: Severity,
        duration: Option<Duration>,
    ) -> NotificationId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let duration_ms = effective_duration(duration, DEFAULT_DURATION).map(millis);
        match severity {
            Severity::Error => tracing::error!(%severity, duration_ms, "{message}"),
            Severity::Warning => tracing::warn!(%severity, duration_ms, "{message}"),
            Severity::Success | Severity::Info => {
                tracing::info!(%severity, duration_ms, "{message}")
            }
        }
        NotificationId(format!("log_{seq}"))
    }
}

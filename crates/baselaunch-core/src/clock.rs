//! Time and scheduling abstraction.
//!
//! Every timestamp and every suspension (request timeouts, retry backoff,
//! reconnect delays) goes through a [`Clock`], so production code runs on real
//! tokio timers while tests drive time by hand.
//!
//! # Examples
//!
//! ```rust
//! use baselaunch_core::clock::{Clock, ManualClock};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let clock = ManualClock::starting_at(1_000);
//! clock.sleep(Duration::from_millis(250)).await;
//!
//! assert_eq!(clock.now_millis(), 1_250);
//! assert_eq!(clock.sleeps(), vec![Duration::from_millis(250)]);
//! # }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Shared, dynamically dispatched clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Source of wall-clock time and timer-driven suspension.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds since the UNIX epoch.
    fn now_millis(&self) -> u64;

    /// Suspend the calling task for `duration`.
    ///
    /// Implementations must yield to the runtime rather than block the thread.
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Real clock backed by [`SystemTime`] and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock for deterministic tests.
///
/// `sleep` never waits: it records the requested duration, advances the
/// clock by that amount, and yields once so other tasks can make progress.
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now_millis: u64,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Create a clock starting at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now_millis())
    }

    /// Create a clock starting at a fixed epoch offset.
    pub fn starting_at(now_millis: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now_millis,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.inner.lock().now_millis += duration.as_millis() as u64;
    }

    /// Jump to an absolute time.
    pub fn set_millis(&self, now_millis: u64) {
        self.inner.lock().now_millis = now_millis;
    }

    /// Every duration passed to [`Clock::sleep`] so far, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    /// Total simulated time spent sleeping.
    pub fn total_slept(&self) -> Duration {
        self.inner.lock().sleeps.iter().sum()
    }

    /// Forget recorded sleeps.
    pub fn reset_sleeps(&self) {
        self.inner.lock().sleeps.clear();
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.inner.lock().now_millis
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock();
            state.sleeps.push(duration);
            state.now_millis += duration.as_millis() as u64;
        }
        tokio::task::yield_now().await;
    }
}

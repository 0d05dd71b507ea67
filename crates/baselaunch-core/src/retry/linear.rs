//! Linear backoff.

use super::strategy::BackoffStrategy;
use std::time::Duration;

/// Linear backoff strategy.
///
/// The delay after failed attempt `n` (0-indexed) is `interval * (n + 1)`,
/// so the first retry waits one interval, the second two, and so on.
///
/// # Examples
///
/// ```rust
/// use baselaunch_core::retry::{BackoffStrategy, LinearBackoff};
/// use std::time::Duration;
///
/// let backoff = LinearBackoff::new(Duration::from_secs(5), 5);
/// assert_eq!(backoff.next_delay(0), Some(Duration::from_secs(5)));
/// assert_eq!(backoff.next_delay(2), Some(Duration::from_secs(15)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    interval: Duration,
    max_retries: u32,
}

impl LinearBackoff {
    /// Create a strategy stepping by `interval`, giving up after `max_retries`.
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
        }
    }

    /// Step between consecutive delays.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl BackoffStrategy for LinearBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.interval.is_zero() {
            return None;
        }
        Some(self.interval.saturating_mul(attempt.saturating_add(1)))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_delays_grow_linearly() {
        let backoff = LinearBackoff::new(Duration::from_millis(500), 3);
        let delays: Vec<_> = (0..3).filter_map(|n| backoff.next_delay(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1_000),
                Duration::from_millis(1_500),
            ]
        );
    }

    #[test]
    fn test_zero_interval_retries_immediately() {
        let backoff = LinearBackoff::new(Duration::ZERO, 2);
        assert_eq!(backoff.next_delay(0), None);
    }

    #[tokio::test]
    async fn test_execute_sleeps_on_the_clock() {
        let clock = ManualClock::starting_at(0);
        let backoff = LinearBackoff::new(Duration::from_secs(1), 2);

        let result: Result<(), std::io::Error> = backoff
            .execute(&clock, || async { Err(std::io::Error::other("down")) })
            .await;

        assert!(result.is_err());
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }
}

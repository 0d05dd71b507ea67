//! Exponential backoff.

use super::strategy::BackoffStrategy;
use std::time::Duration;

/// Exponential backoff strategy.
///
/// Delays between retries grow as `initial_delay * multiplier^attempt`,
/// capped at `max_delay`. The default schedule is exactly 1s, 2s, 4s, ...
///
/// # Mathematical Formula
///
/// For failed attempt `n` (0-indexed):
/// ```text
/// delay = min(initial_delay * (multiplier ^ n), max_delay)
/// ```
///
/// # Examples
///
/// ```rust
/// use baselaunch_core::retry::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::default();
/// assert_eq!(backoff.next_delay(0), Some(Duration::from_secs(1)));
/// assert_eq!(backoff.next_delay(1), Some(Duration::from_secs(2)));
/// assert_eq!(backoff.next_delay(2), Some(Duration::from_secs(4)));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }
}

impl Default for ExponentialBackoff {
    /// Defaults:
    /// - `max_retries`: 3
    /// - `initial_delay`: 1s
    /// - `max_delay`: 60s
    /// - `multiplier`: 2.0
    fn default() -> Self {
        ExponentialBackoffBuilder::default().build()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        // powi overflows to inf for large attempts; min() folds that into the cap
        Some(Duration::from_secs_f64(
            delay.max(0.0).min(self.max_delay.as_secs_f64()),
        ))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Builder for configuring [`ExponentialBackoff`].
///
/// # Examples
///
/// ```rust
/// use baselaunch_core::retry::ExponentialBackoff;
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::builder()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(30))
///     .multiplier(2.0)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ExponentialBackoffBuilder {
    max_retries: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl ExponentialBackoffBuilder {
    /// Set the maximum number of retry attempts. Default: 3
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the delay before the first retry. Default: 1s
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum delay between retries. Default: 60s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential multiplier. Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the `ExponentialBackoff` instance.
    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            max_retries: self.max_retries.unwrap_or(3),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_secs(1)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(60)),
            multiplier: self.multiplier.unwrap_or(2.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_delay_calculation() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(backoff.next_delay(0).unwrap(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(1).unwrap(), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(2).unwrap(), Duration::from_millis(4000));
        assert_eq!(backoff.next_delay(3).unwrap(), Duration::from_millis(8000));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = ExponentialBackoff::builder()
            .max_retries(100)
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5))
            .multiplier(10.0)
            .build();

        for attempt in 5..10 {
            let delay = backoff.next_delay(attempt).unwrap();
            assert_eq!(delay, Duration::from_secs(5), "attempt {attempt}");
        }
        assert_eq!(backoff.next_delay(u32::MAX).unwrap(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_success_on_third_attempt() {
        let clock = ManualClock::starting_at(0);
        let backoff = ExponentialBackoff::builder().max_retries(5).build();

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = backoff
            .execute(&clock, || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    let current = attempts.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err(std::io::Error::other("retry me"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_max_retries_exceeded() {
        let clock = ManualClock::starting_at(0);
        let backoff = ExponentialBackoff::builder().max_retries(2).build();

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = backoff
            .execute(&clock, || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(std::io::Error::other("always fail"))
                }
            })
            .await;

        assert!(result.is_err());
        // initial attempt + 2 retries, no sleep after the last one
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps().len(), 2);
        assert_eq!(clock.now_millis(), 3_000);
    }


    #[test]
    fn test_builder_defaults() {
        let backoff = ExponentialBackoff::builder().build();

        assert_eq!(backoff.max_retries, 3);
        assert_eq!(backoff.initial_delay, Duration::from_secs(1));
        assert_eq!(backoff.max_delay, Duration::from_secs(60));
        assert_eq!(backoff.multiplier, 2.0);
    }

    #[tokio::test]
    async fn test_immediate_success_never_sleeps() {
        let clock = ManualClock::starting_at(0);
        let backoff = ExponentialBackoff::default();

        let result = backoff
            .execute(&clock, || async { Ok::<_, std::io::Error>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_custom_retry_predicate() {
        struct NetworkOnlyBackoff {
            inner: ExponentialBackoff,
        }

        impl BackoffStrategy for NetworkOnlyBackoff {
            fn should_retry(
                &self,
                error: &(dyn std::error::Error + 'static),
                _attempt: u32,
            ) -> bool {
                error.to_string().contains("network")
            }

            fn next_delay(&self, attempt: u32) -> Option<Duration> {
                self.inner.next_delay(attempt)
            }

            fn max_retries(&self) -> u32 {
                self.inner.max_retries()
            }
        }

        let clock = ManualClock::starting_at(0);
        let backoff = NetworkOnlyBackoff {
            inner: ExponentialBackoff::builder().max_retries(5).build(),
        };

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = backoff
            .execute(&clock, || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(std::io::Error::other("auth failed"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        attempts.store(0, Ordering::SeqCst);

        let result = backoff
            .execute(&clock, || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    let current = attempts.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err(std::io::Error::other("network error"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    proptest! {
        #[test]
        fn prop_delay_doubles_until_cap(attempt in 0u32..16) {
            let backoff = ExponentialBackoff::builder()
                .max_delay(Duration::from_secs(3600))
                .build();
            let delay = backoff.next_delay(attempt).unwrap();
            let expected = Duration::from_millis(1000 * 2u64.pow(attempt));
            prop_assert_eq!(delay, expected.min(Duration::from_secs(3600)));
        }
    }
}

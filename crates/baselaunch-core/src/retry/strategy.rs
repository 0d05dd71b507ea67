//! The retry strategy trait.

use crate::clock::Clock;
use async_trait::async_trait;
use std::error::Error;
use std::future::Future;
use std::time::Duration;

/// A strategy for retrying failed operations with backoff.
///
/// Implementations determine when to retry, how long to wait between attempts,
/// and when to give up. Waiting happens on the supplied [`Clock`], never on a
/// hidden global timer.
///
/// # Examples
///
/// ```rust
/// use baselaunch_core::clock::{Clock, ManualClock};
/// use baselaunch_core::retry::{BackoffStrategy, ExponentialBackoff};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let clock = ManualClock::starting_at(0);
/// let backoff = ExponentialBackoff::builder()
///     .max_retries(3)
///     .initial_delay(Duration::from_millis(100))
///     .build();
///
/// let attempts = Arc::new(AtomicU32::new(0));
/// let result = backoff.execute(&clock, || {
///     let attempts = Arc::clone(&attempts);
///     async move {
///         if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(std::io::Error::other("retry me"))
///         } else {
///             Ok(42)
///         }
///     }
/// }).await?;
///
/// assert_eq!(result, 42);
/// assert_eq!(clock.now_millis(), 300);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BackoffStrategy: Send + Sync {
    /// Execute an operation with retry logic.
    ///
    /// The operation is called repeatedly until it succeeds, a non-retryable
    /// error occurs, or the maximum number of retries is exceeded.
    async fn execute<F, Fut, T, E>(&self, clock: &dyn Clock, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if !self.should_retry(&err, attempt) => return Err(err),
                Err(err) if attempt >= self.max_retries() => return Err(err),
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, error = %_err, "operation failed, backing off");
                    if let Some(delay) = self.next_delay(attempt) {
                        clock.sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Determine if an error is retryable.
    ///
    /// Default implementation returns `true` for all errors. Implementations
    /// may `downcast_ref` to their own error type.
    fn should_retry(&self, error: &(dyn Error + 'static), attempt: u32) -> bool {
        let _ = (error, attempt);
        true
    }

    /// Calculate the delay after failed attempt `attempt` (0-indexed).
    ///
    /// `None` means retry immediately.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Maximum number of retries after the initial attempt.
    ///
    /// `max_retries() == 3` means up to 4 attempts in total.
    fn max_retries(&self) -> u32;
}

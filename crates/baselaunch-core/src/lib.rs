#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions for the baselaunch client runtime.
//!
//! This crate provides the pieces every other baselaunch crate schedules
//! work through:
//!
//! - **Injectable time** via the [`Clock`](clock::Clock) trait
//!   - [`SystemClock`](clock::SystemClock) backed by tokio timers
//!   - [`ManualClock`](clock::ManualClock) for deterministic tests
//! - **Retry strategies** via the [`BackoffStrategy`](retry::BackoffStrategy) trait
//!   - Exponential backoff with a delay cap
//!   - Linear backoff for reconnect loops
//!   - Custom retry predicates
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use baselaunch_core::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = ManualClock::new();
//! let backoff = ExponentialBackoff::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let result = backoff.execute(&clock, || async {
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod retry;

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use baselaunch_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
    pub use crate::retry::{
        BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder, LinearBackoff,
    };
}

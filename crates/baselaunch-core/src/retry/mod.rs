//! Retry strategies and backoff implementations.
//!
//! This module provides a universal abstraction for retry logic with exponential
//! or linear backoff and custom retry predicates. Delays are always
//! awaited through a [`Clock`](crate::clock::Clock).
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - Core trait for retry strategies
//! - [`ExponentialBackoff`] - Exponential backoff with a delay cap
//! - [`LinearBackoff`] - Delays that grow by a fixed step
//!
//! # Examples
//!
//! ```rust
//! use baselaunch_core::clock::ManualClock;
//! use baselaunch_core::retry::{BackoffStrategy, ExponentialBackoff};
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
//!     // Your operation here
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

mod exponential;
mod linear;
mod strategy;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use linear::LinearBackoff;
pub use strategy::BackoffStrategy;

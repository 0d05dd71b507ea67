//! HTTP transport implementation
//!
//! Provides a reqwest-backed client that implements the Transport trait.
//! Each call is exactly one network attempt.

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};

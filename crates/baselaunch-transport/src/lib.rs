//! Transport abstraction layer for baselaunch
//!
//! Provides a trait-based transport abstraction so the request pipeline can
//! run against a real HTTP stack in production and a scripted fake in tests.
//!
//! # Architecture
//!
//! - **Transport trait**: one attempt in, one response or error out
//! - **HTTP transport**: reqwest-backed implementation
//! - **Scripted transport**: replays canned outcomes and records requests
//!
//! Retries, timeouts, and backoff live in the caller, which owns the clock.

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Usage
//!
//! ```ignore
//! use baselaunch_transport::{HttpRequest, HttpTransport, Transport};
//!
//! let transport = HttpTransport::new()?;
//! let request = HttpRequest::new("GET", "https://baselaunch.app/api/apps");
//! let response = transport.send_http(request).await?;
//! ```

pub mod error;
pub mod http;
pub mod mock;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::{ScriptedStep, ScriptedTransport};
pub use traits::{HttpRequest, HttpResponse, Transport};

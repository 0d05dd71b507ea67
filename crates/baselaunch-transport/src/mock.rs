//! Scripted transport for tests
//!
//! Replays a fixed sequence of outcomes and records every request it sees,
//! so the request pipeline can be exercised without a network.

use crate::error::{Result, TransportError};
use crate::traits::{HttpRequest, HttpResponse, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One scripted outcome for a single `send_http` call
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Return this response
    Respond(HttpResponse),

    /// Fail with [`TransportError::Timeout`]
    Timeout,

    /// Fail with [`TransportError::Connection`]
    Disconnect(String),

    /// Fail with [`TransportError::Other`]
    Fail(String),

    /// Never complete
    Hang,

    /// Panic inside the transport call
    Panic(String),
}

impl ScriptedStep {
    /// Shorthand for a JSON response
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::Respond(HttpResponse::json(status, &value))
    }

    /// Shorthand for a response with no body
    pub fn status(status: u16) -> Self {
        Self::Respond(HttpResponse::empty(status))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptedStep>,
    fallback: Option<ScriptedStep>,
    requests: Vec<HttpRequest>,
}

/// Transport that plays back [`ScriptedStep`]s in order
///
/// Once the script runs out, the fallback step (if any) is repeated;
/// otherwise calls fail with [`TransportError::Other`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a script from a list of steps
    pub fn from_steps(steps: impl IntoIterator<Item = ScriptedStep>) -> Self {
        let transport = Self::new();
        transport.state.lock().steps.extend(steps);
        transport
    }

    /// Append a step to the script
    pub fn push(&self, step: ScriptedStep) -> &Self {
        self.state.lock().steps.push_back(step);
        self
    }

    /// Step repeated once the script is exhausted
    pub fn with_fallback(self, step: ScriptedStep) -> Self {
        self.state.lock().fallback = Some(step);
        self
    }

    /// Replace the fallback step
    pub fn set_fallback(&self, step: ScriptedStep) {
        self.state.lock().fallback = Some(step);
    }

    /// Remove the fallback step
    pub fn clear_fallback(&self) {
        self.state.lock().fallback = None;
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of `send_http` calls so far
    pub fn call_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Steps not yet consumed
    pub fn remaining(&self) -> usize {
        self.state.lock().steps.len()
    }

    fn next_step(&self, request: HttpRequest) -> Option<ScriptedStep> {
        let mut state = self.state.lock();
        state.requests.push(request);
        state.steps.pop_front().or_else(|| state.fallback.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_http(&self, request: HttpRequest) -> Result<HttpResponse> {
        let step = self.next_step(request);
        match step {
            Some(ScriptedStep::Respond(response)) => Ok(response),
            Some(ScriptedStep::Timeout) => Err(TransportError::Timeout),
            Some(ScriptedStep::Disconnect(msg)) => Err(TransportError::Connection(msg)),
            Some(ScriptedStep::Fail(msg)) => Err(TransportError::Other(msg)),
            Some(ScriptedStep::Hang) => std::future::pending().await,
            Some(ScriptedStep::Panic(msg)) => panic!("{msg}"),
            None => Err(TransportError::Other("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_steps_play_in_order() {
        let transport = ScriptedTransport::from_steps([
            ScriptedStep::status(503),
            ScriptedStep::Disconnect("reset".into()),
            ScriptedStep::json(200, serde_json::json!({"ok": true})),
        ]);

        let first = transport
            .send_http(HttpRequest::new("GET", "http://a/1"))
            .await
            .unwrap();
        assert_eq!(first.status, 503);

        let second = transport
            .send_http(HttpRequest::new("GET", "http://a/2"))
            .await;
        assert!(matches!(second, Err(TransportError::Connection(_))));

        let third = transport
            .send_http(HttpRequest::new("GET", "http://a/3"))
            .await
            .unwrap();
        assert!(third.is_success());

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["http://a/1", "http://a/2", "http://a/3"]);
    }

    #[tokio::test]
    async fn test_exhausted_script_uses_fallback() {
        let transport = ScriptedTransport::new();
        let err = transport
            .send_http(HttpRequest::new("GET", "http://a"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "script exhausted");

        transport.set_fallback(ScriptedStep::status(204));
        for _ in 0..3 {
            let response = transport
                .send_http(HttpRequest::new("GET", "http://a"))
                .await
                .unwrap();
            assert_eq!(response.status, 204);
        }
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn test_hang_never_completes() {
        let transport = ScriptedTransport::from_steps([ScriptedStep::Hang]);
        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            transport.send_http(HttpRequest::new("GET", "http://a")),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(transport.remaining(), 0);
    }
}

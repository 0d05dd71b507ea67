//! API request pipeline
//!
//! [`ApiClient`] resolves endpoints against the configured origin, attaches
//! the stored bearer credential, bounds every attempt with a timeout, and
//! retries failures with exponential backoff. Callers always get an
//! [`ApiResult`] back, never a panic or a raw transport error.

use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::listeners::panic_message;
use crate::notify::{SharedNotifier, TracingNotifier};
use crate::observability::{RequestMetadata, RequestTimer, ResponseMetadata};
use crate::offline::{DrainOutcome, OfflineQueue};
use crate::storage::{KeyValueStore, MemoryBackend};
use crate::types::{ApiResult, Method, QueuedAction, RequestOptions};
use crate::{keys, messages};
use async_trait::async_trait;
use baselaunch_core::clock::{SharedClock, SystemClock};
use baselaunch_core::retry::{BackoffStrategy, ExponentialBackoff};
use baselaunch_transport::{HttpRequest, HttpResponse, Transport};
use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Hook invoked when the server rejects the stored credential (401/403).
pub trait SessionExpiry: Send + Sync {
    /// The session is no longer valid; drop it.
    fn session_expired(&self);
}

/// Anything that can run a request through the pipeline.
///
/// The offline queue replays actions through this seam.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Run one request to completion, retries included.
    async fn execute(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value>;
}

/// Client for the Base Launch API.
///
/// # Example
///
/// ```rust,no_run
/// use baselaunch::{ApiClient, ApiResult};
///
/// # async fn example() -> baselaunch::Result<()> {
/// let client = ApiClient::builder().origin("https://baselaunch.app").build()?;
///
/// match client.get("/api/apps").await {
///     ApiResult::Success { data } => println!("{data}"),
///     ApiResult::Failure { error } => eprintln!("{error}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<KeyValueStore>,
    clock: SharedClock,
    notifier: SharedNotifier,
    connectivity: Arc<ConnectivityMonitor>,
    session: Option<Arc<dyn SessionExpiry>>,
    backoff: PipelineBackoff,
    origin: String,
    timeout: Duration,
    default_headers: BTreeMap<String, String>,
    offline: Arc<OfflineQueue>,
}

impl ApiClient {
    /// Create a builder with default configuration.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Send a request and return its outcome.
    ///
    /// Network errors, timeouts, non-2xx statuses, and unparseable bodies are
    /// retried up to the configured limit; the delay before retry `n` is
    /// `initial_backoff * 2^(n-1)`. A 401 or 403 is never retried: the stored
    /// credential is removed, the session hook runs, and an error
    /// notification is shown.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        let metadata = RequestMetadata::new(options.method.as_str(), endpoint);
        let metadata = match &options.body {
            Some(body) => metadata.with_body_size(body.len()),
            None => metadata,
        };

        let request = match self.build_request(endpoint, &options) {
            Ok(request) => request,
            Err(err) => {
                ResponseMetadata::new(None, Duration::ZERO).log_error(&metadata, &err.to_string());
                return ApiResult::failure(err.to_string());
            }
        };
        let timeout = options.timeout.unwrap_or(self.timeout);

        metadata.log_request();
        let timer = RequestTimer::start(self.clock.clone());

        let attempts = AtomicU32::new(0);
        let outcome = self
            .backoff
            .execute(self.clock.as_ref(), || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let request = request.clone();
                let metadata = &metadata;
                async move {
                    let result = self.attempt(request, timeout).await;
                    if let Err(err) = &result {
                        metadata.log_attempt_failed(attempt, &err.to_string());
                    }
                    result
                }
            })
            .await;
        let retries = attempts.load(Ordering::SeqCst).saturating_sub(1);

        let last_error = match outcome {
            Ok((status, data)) => {
                ResponseMetadata::new(Some(status), timer.elapsed())
                    .with_retries(retries)
                    .log_success(&metadata);
                return ApiResult::success(data);
            }
            Err(err) => err,
        };
        if last_error.is_auth_failure() {
            self.handle_auth_failure();
        }

        let status = match &last_error {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        };
        let message = last_error.to_string();
        ResponseMetadata::new(status, timer.elapsed())
            .with_retries(retries)
            .log_error(&metadata, &message);
        ApiResult::failure(message)
    }

    /// `GET endpoint`
    pub async fn get(&self, endpoint: &str) -> ApiResult<Value> {
        self.request(endpoint, RequestOptions::get()).await
    }

    /// `GET endpoint`, decoding the payload into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        self.get(endpoint).await.decode()
    }

    /// `POST endpoint` with a JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ApiResult<Value> {
        self.send_json(Method::Post, endpoint, body).await
    }

    /// `PUT endpoint` with a JSON body
    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ApiResult<Value> {
        self.send_json(Method::Put, endpoint, body).await
    }

    /// `DELETE endpoint`
    pub async fn delete(&self, endpoint: &str) -> ApiResult<Value> {
        self.request(endpoint, RequestOptions::delete()).await
    }

    /// Whether the device is currently online
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Persist a request for replay once connectivity returns.
    pub async fn queue_offline_action(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> QueuedAction {
        self.offline.enqueue(endpoint, options).await
    }

    /// Replay queued actions through this client.
    ///
    /// Returns `None` when offline or when nothing is queued.
    pub async fn process_offline_queue(&self) -> Option<Vec<DrainOutcome>> {
        self.offline.drain(self).await
    }

    /// Offline queue backing [`queue_offline_action`](Self::queue_offline_action)
    pub fn offline_queue(&self) -> &Arc<OfflineQueue> {
        &self.offline
    }

    /// Drain the offline queue every time connectivity comes back.
    pub fn spawn_offline_sync(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let executor: Arc<dyn RequestExecutor> = self.clone();
        self.offline.spawn_sync_on_reconnect(executor)
    }

    /// Origin endpoints are resolved against
    pub fn origin(&self) -> &str {
        &self.origin
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> ApiResult<Value> {
        match RequestOptions::json(method, body) {
            Ok(options) => self.request(endpoint, options).await,
            Err(err) => ApiResult::failure(Error::from(err).to_string()),
        }
    }

    fn build_request(&self, endpoint: &str, options: &RequestOptions) -> Result<HttpRequest> {
        let url = format!("{}{}", self.origin, endpoint);
        url::Url::parse(&url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

        let mut headers = HashMap::new();
        set_header(&mut headers, "Content-Type", "application/json");
        for (key, value) in self.default_headers.iter().chain(&options.headers) {
            set_header(&mut headers, key, value);
        }
        if let Some(token) = self.store.get_opt::<String>(keys::AUTH_TOKEN) {
            set_header(&mut headers, "Authorization", &format!("Bearer {token}"));
        }

        let mut request = HttpRequest::new(options.method.as_str(), url);
        request.headers = headers;
        if let Some(body) = &options.body {
            request = request.with_text_body(body.clone());
        }
        Ok(request)
    }

    /// One bounded attempt. Returns the status and decoded payload.
    async fn attempt(&self, request: HttpRequest, timeout: Duration) -> Result<(u16, Value)> {
        let send = AssertUnwindSafe(self.transport.send_http(request)).catch_unwind();
        let response = tokio::select! {
            biased;
            result = send => match result {
                Ok(response) => response?,
                Err(payload) => {
                    return Err(Error::Unknown(format!(
                        "transport panicked: {}",
                        panic_message(payload.as_ref())
                    )));
                }
            },
            () = self.clock.sleep(timeout) => return Err(Error::Timeout),
        };
        let data = decode_body(&response)?;
        Ok((response.status, data))
    }

    fn handle_auth_failure(&self) {
        tracing::warn!("credential rejected; clearing session");
        self.store.remove(keys::AUTH_TOKEN);
        if let Some(session) = &self.session {
            session.session_expired();
        }
        self.notifier.error(messages::SESSION_EXPIRED);
    }
}

#[async_trait]
impl RequestExecutor for ApiClient {
    async fn execute(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        self.request(endpoint, options).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.backoff.max_retries())
            .finish_non_exhaustive()
    }
}

fn decode_body(response: &HttpResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(Error::HttpStatus {
            status: response.status,
            status_text: response.status_text.clone(),
        });
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&response.body)?)
}

/// Exponential schedule that stops on failures [`Error::is_retryable`] rejects.
///
/// Auth failures are not retryable, so a 401/403 ends the loop after one attempt.
#[derive(Debug, Clone)]
struct PipelineBackoff(ExponentialBackoff);

impl BackoffStrategy for PipelineBackoff {
    fn should_retry(&self, error: &(dyn std::error::Error + 'static), _attempt: u32) -> bool {
        error.downcast_ref::<Error>().is_some_and(Error::is_retryable)
    }

    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.0.next_delay(attempt)
    }

    fn max_retries(&self) -> u32 {
        self.0.max_retries()
    }
}

/// Insert a header, replacing any existing entry with the same name in any case.
fn set_header(headers: &mut HashMap<String, String>, key: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
    headers.insert(key.to_string(), value.to_string());
}

/// Builder for creating a configured [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<KeyValueStore>>,
    clock: Option<SharedClock>,
    notifier: Option<SharedNotifier>,
    connectivity: Option<Arc<ConnectivityMonitor>>,
    session: Option<Arc<dyn SessionExpiry>>,
}

impl ApiClientBuilder {
    /// Take origin, timeout, retry, and queue settings from `config`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the origin.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = origin.into();
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .insert(key.into(), value.into());
        self
    }

    /// Use `transport` instead of a fresh [`HttpTransport`](baselaunch_transport::HttpTransport).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Read the credential from, and queue offline actions into, `store`.
    pub fn store(mut self, store: Arc<KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Schedule timeouts and backoff on `clock`.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Send user-facing messages to `notifier`.
    pub fn notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Read online state from `connectivity`.
    pub fn connectivity(mut self, connectivity: Arc<ConnectivityMonitor>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Call `session` when the server rejects the credential.
    pub fn session(mut self, session: Arc<dyn SessionExpiry>) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the default HTTP
    /// transport cannot be created.
    pub fn build(self) -> Result<ApiClient> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(baselaunch_transport::HttpTransport::new()?),
        };
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier::new()));
        let store = self.store.unwrap_or_else(|| {
            Arc::new(
                KeyValueStore::new(Arc::new(MemoryBackend::new()), clock.clone())
                    .with_prefix(config.storage_prefix.clone())
                    .with_schema_version(config.schema_version.clone())
                    .with_retention(config.retention)
                    .with_notifier(notifier.clone()),
            )
        });
        let connectivity = self.connectivity.unwrap_or_default();

        let backoff = PipelineBackoff(
            ExponentialBackoff::builder()
                .max_retries(config.max_retries)
                .initial_delay(config.initial_backoff)
                .max_delay(config.max_backoff)
                .multiplier(2.0)
                .build(),
        );

        let offline = Arc::new(
            OfflineQueue::new(store.clone(), clock.clone(), connectivity.clone())
                .with_notifier(notifier.clone())
                .with_max_len(config.max_queue_len),
        );

        Ok(ApiClient {
            transport,
            store,
            clock,
            notifier,
            connectivity,
            session: self.session,
            backoff,
            origin: config.origin.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            default_headers: config.default_headers,
            offline,
        })
    }
}

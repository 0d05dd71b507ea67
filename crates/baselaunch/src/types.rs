//! Shared request, result, and queue types

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP method accepted by the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single pipeline call.
///
/// Persisted inside queued offline actions, so it round-trips through JSON.
/// The timeout is stored as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    /// HTTP method
    #[serde(default)]
    pub method: Method,

    /// Extra headers; these win over the pipeline defaults
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Serialized request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Per-call timeout override
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "duration_millis"
    )]
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options for the given method with no body
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// GET options
    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    /// DELETE options
    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    /// Options with a JSON-serialized body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(method: Method, body: &T) -> serde_json::Result<Self> {
        Ok(Self::new(method).with_body(serde_json::to_string(body)?))
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the raw body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Normalized outcome of a pipeline call.
///
/// The pipeline never raises: every failure is folded into `Failure` with a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApiResult<T> {
    /// The call produced a 2xx response with a parseable body
    Success {
        /// Parsed response body
        data: T,
    },
    /// The call failed after the retry policy was exhausted or short-circuited
    Failure {
        /// Last failure message
        error: String,
    },
}

impl<T> ApiResult<T> {
    /// Success constructor
    pub fn success(data: T) -> Self {
        ApiResult::Success { data }
    }

    /// Failure constructor
    pub fn failure(error: impl Into<String>) -> Self {
        ApiResult::Failure {
            error: error.into(),
        }
    }

    /// Whether this is `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    /// Borrow the data on success
    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResult::Success { data } => Some(data),
            ApiResult::Failure { .. } => None,
        }
    }

    /// Borrow the message on failure
    pub fn error(&self) -> Option<&str> {
        match self {
            ApiResult::Success { .. } => None,
            ApiResult::Failure { error } => Some(error),
        }
    }

    /// Convert into a standard `Result`
    pub fn into_result(self) -> Result<T, String> {
        match self {
            ApiResult::Success { data } => Ok(data),
            ApiResult::Failure { error } => Err(error),
        }
    }

    /// Map the success payload
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            ApiResult::Success { data } => ApiResult::Success { data: f(data) },
            ApiResult::Failure { error } => ApiResult::Failure { error },
        }
    }
}

impl ApiResult<serde_json::Value> {
    /// Decode the JSON payload into a typed value.
    ///
    /// A payload that does not match `T` becomes a `Failure`.
    pub fn decode<T: DeserializeOwned>(self) -> ApiResult<T> {
        match self {
            ApiResult::Success { data } => match serde_json::from_value(data) {
                Ok(data) => ApiResult::Success { data },
                Err(e) => ApiResult::Failure {
                    error: format!("Failed to parse response: {e}"),
                },
            },
            ApiResult::Failure { error } => ApiResult::Failure { error },
        }
    }
}

/// A request captured while offline, replayed later in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Path appended to the origin
    pub endpoint: String,

    /// Options the request will be replayed with
    #[serde(default)]
    pub options: RequestOptions,

    /// Enqueue time, milliseconds since the UNIX epoch
    pub timestamp: u64,

    /// Random 9-character base-36 identifier
    pub id: String,
}

/// Random lowercase base-36 string of `len` characters.
pub(crate) fn random_base36(len: usize) -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

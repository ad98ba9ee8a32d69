//! Request descriptors and the factory that validates them.
//!
//! A [`RequestDescriptor`] is the immutable description of one outbound
//! call. It is built through [`RequestBuilder`], which normalizes the
//! address, serializes the payload once into a canonical JSON value, and
//! rejects malformed requests before they reach the scheduler.
//!
//! # Example
//!
//! ```
//! use courier::domain::{Priority, RequestDescriptor};
//! use std::time::Duration;
//!
//! let descriptor = RequestDescriptor::post("https://api.example.com/sync")
//!     .json(&serde_json::json!({"entries": [1, 2, 3]}))
//!     .priority(Priority::High)
//!     .timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(descriptor.priority(), Priority::High);
//! assert_eq!(descriptor.retry_count(), 0);
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::cache::CacheKey;
use super::cancel::CancellationToken;
use super::id::RequestId;
use super::priority::Priority;
use crate::error::RequestError;

/// HTTP method of a request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether requests with this method may carry a body.
    #[must_use]
    pub const fn allows_body(self) -> bool {
        !matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address and method of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    method: Method,
    url: Url,
}

impl Target {
    /// Parse and validate an address.
    ///
    /// The URL parser lowercases scheme and host and drops default ports;
    /// the query string is sent exactly as given.
    pub fn new(method: Method, address: &str) -> Result<Self, RequestError> {
        let url = Url::parse(address.trim())
            .map_err(|e| RequestError::InvalidRequest(format!("invalid address '{address}': {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequestError::InvalidRequest(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(RequestError::InvalidRequest(format!(
                "address '{address}' has no host"
            )));
        }

        Ok(Self { method, url })
    }

    /// Address in cache-key form.
    ///
    /// Drops the fragment and orders query parameters by name. The sort is
    /// stable and works on the raw segments, so repeated keys keep their
    /// relative order and encodings are left untouched.
    #[must_use]
    pub fn normalized_address(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        let segments: Option<Vec<String>> = url.query().map(|query| {
            let mut segments: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();
            segments.sort_by(|a, b| query_name(a).cmp(query_name(b)));
            segments.into_iter().map(str::to_string).collect()
        });
        match segments {
            Some(segments) if !segments.is_empty() => url.set_query(Some(&segments.join("&"))),
            _ => url.set_query(None),
        }
        url.into()
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

fn query_name(segment: &str) -> &str {
    segment.split_once('=').map_or(segment, |(name, _)| name)
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Fallback values applied by [`RequestBuilder`] when a field is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDefaults {
    pub timeout: Duration,
    pub max_retries: u32,
    /// TTL used by [`RequestBuilder::cached`].
    pub cache_ttl: Duration,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

/// Immutable description of one outbound request.
///
/// Not `Clone`: a descriptor is moved into the engine on submission so its
/// id can never be submitted twice. Only `retry_count` changes afterwards,
/// and only inside the engine.
#[derive(Debug)]
pub struct RequestDescriptor {
    id: RequestId,
    target: Target,
    payload: Option<serde_json::Value>,
    headers: Vec<(String, String)>,
    priority: Priority,
    created_at: DateTime<Utc>,
    retry_count: u32,
    max_retries: u32,
    timeout: Duration,
    cache_ttl: Option<Duration>,
    cancellation_token: CancellationToken,
}

impl RequestDescriptor {
    /// Start building a descriptor for `method` + `address`.
    pub fn builder(method: Method, address: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, address)
    }

    pub fn get(address: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Get, address)
    }

    pub fn post(address: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Post, address)
    }

    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.target.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.target.url
    }

    #[must_use]
    pub const fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// TTL for caching a successful response, if the request is cacheable.
    #[must_use]
    pub const fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }

    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Deterministic cache key for this request.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.target, self.payload.as_ref())
    }

    /// Whether another attempt is allowed after a retryable failure.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Count one retry. Refuses to move past `max_retries`.
    pub(crate) fn record_retry(&mut self) -> bool {
        if self.can_retry() {
            self.retry_count += 1;
            true
        } else {
            false
        }
    }
}

/// Builder that validates and normalizes a [`RequestDescriptor`].
#[derive(Debug)]
#[must_use]
pub struct RequestBuilder {
    method: Method,
    address: String,
    payload: Option<Result<serde_json::Value, String>>,
    headers: Vec<(String, String)>,
    priority: Priority,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    cache_ttl: Option<Duration>,
    use_default_ttl: bool,
    token: Option<CancellationToken>,
    defaults: RequestDefaults,
}

impl RequestBuilder {
    fn new(method: Method, address: impl Into<String>) -> Self {
        Self {
            method,
            address: address.into(),
            payload: None,
            headers: Vec::new(),
            priority: Priority::default(),
            timeout: None,
            max_retries: None,
            cache_ttl: None,
            use_default_ttl: false,
            token: None,
            defaults: RequestDefaults::default(),
        }
    }

    /// Replace the fallback values used for unset fields.
    pub fn defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Attach a JSON payload. Serialization errors surface from [`build`](Self::build).
    pub fn json<P: Serialize + ?Sized>(mut self, payload: &P) -> Self {
        self.payload = Some(serde_json::to_value(payload).map_err(|e| e.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Cache a successful response for `ttl`.
    pub fn cache_for(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Cache a successful response for the default TTL.
    pub fn cached(mut self) -> Self {
        self.use_default_ttl = true;
        self
    }

    /// Use a caller-owned cancellation token instead of a fresh one.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Validate and produce the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidRequest`] for an unparseable or
    /// non-HTTP address, a payload on GET/HEAD, a payload that failed to
    /// serialize, an invalid header name, or a zero timeout.
    pub fn build(self) -> Result<RequestDescriptor, RequestError> {
        let target = Target::new(self.method, &self.address)?;

        let payload = match self.payload {
            None => None,
            Some(Err(reason)) => {
                return Err(RequestError::InvalidRequest(format!(
                    "payload serialization failed: {reason}"
                )))
            }
            Some(Ok(value)) => {
                if !self.method.allows_body() {
                    return Err(RequestError::InvalidRequest(format!(
                        "{} requests cannot carry a payload",
                        self.method
                    )));
                }
                Some(value)
            }
        };

        let mut headers = Vec::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() || !name.bytes().all(is_header_name_byte) {
                return Err(RequestError::InvalidRequest(format!(
                    "invalid header name '{name}'"
                )));
            }
            if value.contains(['\r', '\n']) {
                return Err(RequestError::InvalidRequest(format!(
                    "header '{name}' contains a line break"
                )));
            }
            headers.push((name, value));
        }

        let timeout = self.timeout.unwrap_or(self.defaults.timeout);
        if timeout.is_zero() {
            return Err(RequestError::InvalidRequest("timeout must be non-zero".into()));
        }

        let cache_ttl = match (self.cache_ttl, self.use_default_ttl) {
            (Some(ttl), _) => Some(ttl),
            (None, true) => Some(self.defaults.cache_ttl),
            (None, false) => None,
        };

        Ok(RequestDescriptor {
            id: RequestId::new(),
            target,
            payload,
            headers,
            priority: self.priority,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries: self.max_retries.unwrap_or(self.defaults.max_retries),
            timeout,
            cache_ttl: cache_ttl.filter(|ttl| !ttl.is_zero()),
            cancellation_token: self.token.unwrap_or_default(),
        })
    }
}

/// RFC 7230 `tchar`.
fn is_header_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

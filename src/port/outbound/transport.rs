//! Transport port: the host's HTTP client.
//!
//! The engine never talks to the network directly. It hands a
//! [`TransportRequest`] to a [`Transport`] together with an abort token and
//! classifies the returned status itself.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::domain::{CancellationToken, Method, Validator};
use crate::error::RequestError;

/// One attempt as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    /// Lowercased header names.
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Deadline the engine enforces; transports may pass it to their client.
    pub timeout: Duration,
}

impl TransportRequest {
    /// Add conditional revalidation headers for a stale cache entry.
    pub fn add_conditional_headers(&mut self, validator: &Validator) {
        if let Some(etag) = &validator.etag {
            self.headers.push(("if-none-match".to_string(), etag.clone()));
        }
        if let Some(last_modified) = &validator.last_modified {
            self.headers
                .push(("if-modified-since".to_string(), last_modified.clone()));
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw transport outcome of a request that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Lowercased header names.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Build a response with a JSON body.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    #[must_use]
    pub const fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    /// `Retry-After` in delta-seconds form.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Decode the body: JSON when it parses, a string otherwise, null when empty.
    #[must_use]
    pub fn body_value(&self) -> serde_json::Value {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::Value::Null;
        }
        serde_json::from_slice(&self.body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&self.body).into_owned())
        })
    }

    /// Error for a non-success, non-304 status.
    #[must_use]
    pub fn to_error(&self) -> RequestError {
        RequestError::Http {
            status: self.status,
            retry_after: self.retry_after(),
        }
    }
}

/// HTTP client used by the engine.
///
/// Implementations return `Ok` for every response that reached the server,
/// whatever its status, and map connection-level failures to
/// [`RequestError::NetworkUnavailable`] or [`RequestError::Timeout`].
/// When `abort` fires, the implementation should drop the underlying
/// connection and return [`RequestError::Cancelled`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        abort: CancellationToken,
    ) -> Result<TransportResponse, RequestError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_value_parses_json() {
        let response = TransportResponse::json(200, &json!({"a": 1}));
        assert_eq!(response.body_value(), json!({"a": 1}));
    }

    #[test]
    fn body_value_falls_back_to_text() {
        let mut response = TransportResponse::new(200);
        response.body = b"plain text".to_vec();
        assert_eq!(response.body_value(), json!("plain text"));
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(TransportResponse::new(204).body_value(), serde_json::Value::Null);
    }

    #[test]
    fn retry_after_parses_seconds() {
        let response = TransportResponse::new(429).with_header("Retry-After", "3");
        assert_eq!(response.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(
            response.to_error(),
            RequestError::Http {
                status: 429,
                retry_after: Some(Duration::from_secs(3))
            }
        );
    }

    #[test]
    fn conditional_headers() {
        let mut request = TransportRequest {
            method: Method::Get,
            url: Url::parse("https://example.com").unwrap(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(1),
        };
        request.add_conditional_headers(&Validator {
            etag: Some("\"v1\"".into()),
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".into()),
        });

        assert_eq!(request.header("If-None-Match"), Some("\"v1\""));
        assert!(request.header("if-modified-since").is_some());
    }
}

use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failure of a single submitted request.
///
/// Every request ends in exactly one terminal state; this is the payload of
/// the failed and cancelled ones. Errors are `Clone` so batch records and
/// retry bookkeeping can keep copies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The attempt did not complete before its deadline.
    #[error("request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The server answered with a non-success status.
    #[error("HTTP error: status {status}")]
    Http {
        status: u16,
        /// Server-provided `Retry-After` hint, if any.
        retry_after: Option<Duration>,
    },

    /// The network could not be reached at all.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The request was cancelled before it reached a terminal state.
    #[error("request cancelled")]
    Cancelled,

    /// A retryable failure persisted through every allowed retry.
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded {
        attempts: u32,
        last: Box<RequestError>,
    },

    /// The request could not be built or sent as specified.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The engine has been disposed and accepts no more work.
    #[error("engine stopped")]
    Stopped,
}

impl RequestError {
    /// Build an HTTP error without a retry hint.
    #[must_use]
    pub const fn http(status: u16) -> Self {
        Self::Http {
            status,
            retry_after: None,
        }
    }

    /// Whether the retry controller may re-submit after this error.
    ///
    /// Timeouts, server errors (5xx) and rate limiting (429) are transient;
    /// everything else is terminal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status == 429 || (*status >= 500 && *status < 600),
            _ => false,
        }
    }

    /// Server-provided delay hint for rate-limited responses.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::MaxRetriesExceeded { last, .. } => last.status(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

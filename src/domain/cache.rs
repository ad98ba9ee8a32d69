//! Cache keys and entries.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::request::Target;

/// Deterministic key of a cacheable request.
///
/// Derived from method, normalized address and the canonical JSON
/// serialization of the payload (object keys sorted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an arbitrary caller-chosen key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for a request target and payload.
    #[must_use]
    pub fn derive(target: &Target, payload: Option<&serde_json::Value>) -> Self {
        let mut key = format!("{} {}", target.method(), target.normalized_address());
        if let Some(payload) = payload {
            key.push(' ');
            key.push_str(&payload.to_string());
        }
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Revalidation metadata captured from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validator {
    /// Build a validator, or `None` when neither field is present.
    #[must_use]
    pub fn from_parts(etag: Option<String>, last_modified: Option<String>) -> Option<Self> {
        if etag.is_none() && last_modified.is_none() {
            None
        } else {
            Some(Self {
                etag,
                last_modified,
            })
        }
    }
}

/// A cached response body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: serde_json::Value,
    pub stored_at: Instant,
    pub ttl: Duration,
    pub validator: Option<Validator>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(key: CacheKey, data: serde_json::Value, ttl: Duration) -> Self {
        Self {
            key,
            data,
            stored_at: Instant::now(),
            ttl,
            validator: None,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Option<Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Valid iff `now - stored_at < ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

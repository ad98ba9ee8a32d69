//! Successful request outcome.

use serde::de::DeserializeOwned;

use super::cache::Validator;
use crate::error::RequestError;

/// Data returned to the caller on success.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    data: serde_json::Value,
    from_cache: bool,
    validator: Option<Validator>,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, data: serde_json::Value) -> Self {
        Self {
            status,
            data,
            from_cache: false,
            validator: None,
        }
    }

    /// A response served from the cache without a network round trip.
    #[must_use]
    pub fn cached(data: serde_json::Value) -> Self {
        Self {
            status: 200,
            data,
            from_cache: true,
            validator: None,
        }
    }

    #[must_use]
    pub(crate) fn with_validator(mut self, validator: Option<Validator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub(crate) fn mark_cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub const fn data(&self) -> &serde_json::Value {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> serde_json::Value {
        self.data
    }

    #[must_use]
    pub const fn from_cache(&self) -> bool {
        self.from_cache
    }

    #[must_use]
    pub const fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    /// Decode the body into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_value(self.data.clone()).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

//! Engine configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all engine settings.
//! Every field has a default, so an empty file is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use courier::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("courier.toml")?;
//!     config.init_logging();
//!     let settings = config.engine_settings();
//!     assert!(settings.max_concurrent > 0);
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::engine::{
    request_defaults, BatchConfig, CacheConfig, QualityConfig, RequestConfig, RetryConfig,
    SchedulerConfig,
};
use super::logging::LoggingConfig;
use crate::application::engine::EngineSettings;
use crate::domain::{Method, Target};
use crate::error::{ConfigError, Result};

/// Allowed range of `quality.window_size`.
pub const WINDOW_SIZE_RANGE: std::ops::RangeInclusive<usize> = 10..=100;

/// Main engine configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Concurrency limit.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Per-request defaults.
    #[serde(default)]
    pub request: RequestConfig,

    /// Backoff between retries.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Response cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Connection quality window, evaluation cadence and idle probing.
    #[serde(default)]
    pub quality: QualityConfig,

    /// Batch record retention.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML content is malformed
    /// - Validation fails (e.g., a zero concurrency limit)
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize the global tracing subscriber.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Runtime settings for [`Engine::new`](crate::application::engine::Engine::new).
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_concurrent: self.scheduler.max_concurrent,
            request: request_defaults(&self.request, &self.cache),
            retry: (&self.retry).into(),
            cache_max_entries: self.cache.max_entries,
            quality: (&self.quality).into(),
            max_retained_batches: self.batch.max_retained,
        }
    }

    /// Validate configuration values.
    ///
    /// Checks that all values are within acceptable ranges.
    fn validate(&self) -> Result<()> {
        if self.scheduler.max_concurrent == 0 {
            return Err(invalid("max_concurrent", "must be greater than 0"));
        }
        if self.request.default_timeout_ms == 0 {
            return Err(invalid("default_timeout_ms", "must be greater than 0"));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms", "must be greater than 0"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(invalid("max_delay_ms", "must be >= base_delay_ms"));
        }
        if self.cache.default_ttl_ms == 0 {
            return Err(invalid("default_ttl_ms", "must be greater than 0"));
        }
        if self.cache.max_entries == 0 {
            return Err(invalid("max_entries", "must be greater than 0"));
        }
        if !WINDOW_SIZE_RANGE.contains(&self.quality.window_size) {
            return Err(invalid("window_size", "must be between 10 and 100"));
        }
        if self.quality.evaluation_interval_ms == 0 {
            return Err(invalid("evaluation_interval_ms", "must be greater than 0"));
        }
        if self.quality.probe_timeout_ms == 0 {
            return Err(invalid("probe_timeout_ms", "must be greater than 0"));
        }
        if let Some(address) = &self.quality.probe_address {
            Target::new(Method::Head, address).map_err(|e| ConfigError::InvalidValue {
                field: "probe_address",
                reason: e.to_string(),
            })?;
        }
        if self.batch.max_retained == 0 {
            return Err(invalid("max_retained", "must be greater than 0"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(invalid("format", "must be \"pretty\" or \"json\""));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}

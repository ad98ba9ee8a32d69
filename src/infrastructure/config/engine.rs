//! Engine tuning sections: scheduling, request defaults, retry, cache,
//! connection quality and batch history.

use std::time::Duration;

use serde::Deserialize;

use crate::application::engine::QualitySettings;
use crate::application::retry::RetryPolicy;
use crate::domain::RequestDefaults;

/// Admission control.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of requests in flight.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    6
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Defaults applied to requests that do not set their own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            default_max_retries: default_max_retries(),
        }
    }
}

impl RequestConfig {
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add up to 20% random jitter to each delay.
    #[serde(default)]
    pub jitter: bool,
}

fn default_base_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_max_delay_ms() -> u64 {
    30_000 // 30 seconds
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

/// Response cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// TTL for requests marked cacheable without an explicit TTL.
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_max_entries() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_ttl_ms(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

/// Connection quality monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QualityConfig {
    /// Samples in the rolling window, 10 to 100.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_evaluation_interval_ms")]
    pub evaluation_interval_ms: u64,
    /// Probe after this long without traffic (milliseconds).
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,
    /// Address probed with `HEAD` while idle. Probing is off when unset.
    #[serde(default)]
    pub probe_address: Option<String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_window_size() -> usize {
    20
}

fn default_evaluation_interval_ms() -> u64 {
    5000
}

fn default_idle_threshold_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            evaluation_interval_ms: default_evaluation_interval_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
            probe_address: None,
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl QualityConfig {
    #[must_use]
    pub const fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }

    #[must_use]
    pub const fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl From<&QualityConfig> for QualitySettings {
    fn from(config: &QualityConfig) -> Self {
        Self {
            window_size: config.window_size,
            evaluation_interval: config.evaluation_interval(),
            idle_threshold: config.idle_threshold(),
            probe_address: config.probe_address.clone(),
            probe_timeout: config.probe_timeout(),
        }
    }
}

/// Batch history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchConfig {
    /// Finished batch records kept for inspection.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

fn default_max_retained() -> usize {
    100
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
        }
    }
}

/// Request defaults assembled from the `[request]` and `[cache]` sections.
#[must_use]
pub fn request_defaults(request: &RequestConfig, cache: &CacheConfig) -> RequestDefaults {
    RequestDefaults {
        timeout: request.default_timeout(),
        max_retries: request.default_max_retries,
        cache_ttl: cache.default_ttl(),
    }
}

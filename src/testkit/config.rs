//! Canonical test configurations.
//!
//! Single source of truth for engine settings used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::time::Duration;

use crate::application::engine::{EngineSettings, QualitySettings};
use crate::application::retry::RetryPolicy;
use crate::domain::RequestDefaults;

/// Settings with millisecond backoff and no jitter, so retry tests finish fast.
pub fn engine(max_concurrent: usize) -> EngineSettings {
    EngineSettings {
        max_concurrent,
        request: RequestDefaults {
            timeout: Duration::from_secs(2),
            max_retries: 3,
            cache_ttl: Duration::from_secs(60),
        },
        retry: retry(),
        cache_max_entries: 100,
        quality: quality(),
        max_retained_batches: 10,
    }
}

/// 10ms base delay, 200ms cap.
pub fn retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(200),
        jitter: false,
    }
}

/// Smallest allowed window, fast evaluation, no probing.
pub fn quality() -> QualitySettings {
    QualitySettings {
        window_size: 10,
        evaluation_interval: Duration::from_millis(20),
        idle_threshold: Duration::from_secs(30),
        probe_address: None,
        probe_timeout: Duration::from_millis(200),
    }
}

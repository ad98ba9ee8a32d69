//! Statistics snapshot types.
//!
//! A [`Stats`] value is a point-in-time copy of the engine counters; the
//! derived metrics are computed from it on demand.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of engine counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cancelled_requests: u64,
    /// Re-submissions performed by the retry controller.
    pub retries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Sum of latencies of successful requests.
    pub total_latency: Duration,
    /// Wall-clock start of the current connection period.
    pub connection_start: Option<DateTime<Utc>>,
    /// Time since `connection_start` when the snapshot was taken.
    pub uptime: Duration,
}

impl Stats {
    /// Successful share of finished requests, `0.0..=1.0`.
    ///
    /// Returns `None` before any request has finished.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.successful_requests + self.failed_requests;
        if finished == 0 {
            None
        } else {
            Some(self.successful_requests as f64 / finished as f64)
        }
    }

    /// `hits / (hits + misses)`, or `None` with no lookups yet.
    #[must_use]
    pub fn cache_hit_rate(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / lookups as f64)
        }
    }

    /// `total_latency / successful_requests`.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        match u32::try_from(self.successful_requests) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_latency / n,
            Err(_) => Duration::from_secs_f64(
                self.total_latency.as_secs_f64() / self.successful_requests as f64,
            ),
        }
    }

    /// Requests that have not reached a terminal state yet.
    #[must_use]
    pub fn in_progress(&self) -> u64 {
        self.total_requests.saturating_sub(
            self.successful_requests + self.failed_requests + self.cancelled_requests,
        )
    }
}

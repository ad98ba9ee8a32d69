//! Engine-wide counters.
//!
//! Counters live behind a single lock so a [`Stats`] snapshot is always
//! internally consistent: a reader never sees a success counted without its
//! latency, or a terminal outcome without the submission that produced it.
//!
//! Every submission is tagged with the current [`Generation`]. A reset starts
//! a new generation, and outcomes reported for an older one are dropped, so
//! requests still winding down after a reset cannot skew the fresh counters.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::Stats;

/// Counter epoch a submission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug, Default)]
struct Counters {
    generation: u64,
    total: u64,
    succeeded: u64,
    failed: u64,
    cancelled: u64,
    retries: u64,
    cache_hits: u64,
    cache_misses: u64,
    total_latency: Duration,
}

/// Thread-safe statistics aggregator shared by the cache and the engine.
#[derive(Debug)]
pub struct StatsAggregator {
    counters: Mutex<Counters>,
    connection_start: Mutex<(Instant, DateTime<Utc>)>,
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            connection_start: Mutex::new((Instant::now(), Utc::now())),
        }
    }

    /// A request entered the network path. Its outcome must be reported
    /// with the returned generation.
    pub fn record_submitted(&self) -> Generation {
        let mut counters = self.counters.lock();
        counters.total += 1;
        Generation(counters.generation)
    }

    /// A request completed successfully after `latency`.
    pub fn record_success(&self, generation: Generation, latency: Duration) {
        self.update(generation, |counters| {
            counters.succeeded += 1;
            counters.total_latency = counters.total_latency.saturating_add(latency);
        });
    }

    pub fn record_failure(&self, generation: Generation) {
        self.update(generation, |counters| counters.failed += 1);
    }

    pub fn record_cancelled(&self, generation: Generation) {
        self.update(generation, |counters| counters.cancelled += 1);
    }

    pub fn record_retry(&self, generation: Generation) {
        self.update(generation, |counters| counters.retries += 1);
    }

    fn update(&self, generation: Generation, apply: impl FnOnce(&mut Counters)) {
        let mut counters = self.counters.lock();
        if counters.generation == generation.0 {
            apply(&mut counters);
        }
    }

    pub fn record_cache_hit(&self) {
        self.counters.lock().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.counters.lock().cache_misses += 1;
    }

    /// Start a new connection period without touching the counters.
    pub fn mark_connected(&self) {
        *self.connection_start.lock() = (Instant::now(), Utc::now());
    }

    /// Consistent point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> Stats {
        let (started, started_at) = *self.connection_start.lock();
        let counters = self.counters.lock();
        Stats {
            total_requests: counters.total,
            successful_requests: counters.succeeded,
            failed_requests: counters.failed,
            cancelled_requests: counters.cancelled,
            retries: counters.retries,
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            total_latency: counters.total_latency,
            connection_start: Some(started_at),
            uptime: started.elapsed(),
        }
    }

    /// Zero every counter, start a new generation and restart the
    /// connection period.
    pub fn reset(&self) {
        {
            let mut counters = self.counters.lock();
            let generation = counters.generation.wrapping_add(1);
            *counters = Counters {
                generation,
                ..Counters::default()
            };
        }
        self.mark_connected();
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn snapshot_reflects_recorded_outcomes() {
        let stats = StatsAggregator::new();
        let first = stats.record_submitted();
        let second = stats.record_submitted();
        stats.record_success(first, Duration::from_millis(40));
        stats.record_failure(second);
        stats.record_retry(second);
        stats.record_cache_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.successful_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.average_latency(), Duration::from_millis(40));
        assert!(snapshot.connection_start.is_some());
    }

    #[test]
    fn reset_zeroes_counters() {
        let stats = StatsAggregator::new();
        stats.record_submitted();
        stats.record_cache_hit();
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.cache_hits, 0);
        assert!(snapshot.uptime < Duration::from_secs(1));
    }

    #[test]
    fn outcomes_from_before_reset_are_dropped() {
        let stats = StatsAggregator::new();
        let stale = stats.record_submitted();
        stats.reset();

        stats.record_cancelled(stale);
        stats.record_retry(stale);
        let fresh = stats.record_submitted();
        stats.record_success(fresh, Duration::from_millis(5));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.successful_requests, 1);
        assert_eq!(snapshot.cancelled_requests, 0);
        assert_eq!(snapshot.retries, 0);
        assert_eq!(snapshot.in_progress(), 0);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(StatsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let generation = stats.record_submitted();
                        stats.record_success(generation, Duration::from_micros(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 8000);
        assert_eq!(snapshot.successful_requests, 8000);
        assert_eq!(snapshot.total_latency, Duration::from_millis(8));
    }
}

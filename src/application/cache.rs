//! TTL response cache.
//!
//! Entries are keyed by [`CacheKey`] and expire `ttl` after they were
//! stored. Expired entries are removed lazily on lookup, in bulk via
//! [`CacheStore::evict_expired`], and oldest-first when the store grows past
//! its entry limit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use super::stats::StatsAggregator;
use crate::domain::{CacheEntry, CacheKey, Validator};

/// Outcome of a cache lookup on the request path.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// A valid entry; serve it without touching the network.
    Fresh(serde_json::Value),
    /// An expired entry that carries a validator and may be revalidated.
    Stale(CacheEntry),
    Miss,
}

/// Thread-safe response cache.
pub struct CacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    stats: Arc<StatsAggregator>,
    max_entries: usize,
}

impl CacheStore {
    #[must_use]
    pub fn new(max_entries: usize, stats: Arc<StatsAggregator>) -> Self {
        Self {
            entries: DashMap::new(),
            stats,
            max_entries: max_entries.max(1),
        }
    }

    /// Lookup used by the request path. Counts one hit or one miss.
    pub fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid_at(now) {
                let data = entry.data.clone();
                drop(entry);
                self.stats.record_cache_hit();
                trace!(key = %key, "cache hit");
                return CacheLookup::Fresh(data);
            }
        }

        self.stats.record_cache_miss();
        match self.entries.remove_if(key, |_, entry| !entry.is_valid_at(now)) {
            Some((_, entry)) if entry.validator.is_some() => {
                trace!(key = %key, "cache entry stale, revalidating");
                CacheLookup::Stale(entry)
            }
            _ => CacheLookup::Miss,
        }
    }

    /// Data for `key` if a valid entry exists. Expired entries are removed.
    pub fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        match self.lookup(key) {
            CacheLookup::Fresh(data) => Some(data),
            CacheLookup::Stale(_) | CacheLookup::Miss => None,
        }
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, data: serde_json::Value, ttl: Duration) {
        self.set_with_validator(key, data, ttl, None);
    }

    pub fn set_with_validator(
        &self,
        key: CacheKey,
        data: serde_json::Value,
        ttl: Duration,
        validator: Option<Validator>,
    ) {
        let entry = CacheEntry::new(key.clone(), data, ttl).with_validator(validator);
        self.entries.insert(key, entry);

        if self.entries.len() > self.max_entries {
            self.gc();
        }
    }

    /// Remove one entry, or every entry when `key` is `None`.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, key: Option<&CacheKey>) -> usize {
        match key {
            Some(key) => usize::from(self.entries.remove(key).is_some()),
            None => {
                let removed = self.entries.len();
                self.entries.clear();
                removed
            }
        }
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "evicted expired cache entries");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn gc(&self) {
        self.evict_expired();

        if self.entries.len() > self.max_entries {
            let mut entries: Vec<(CacheKey, Instant)> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().stored_at))
                .collect();

            entries.sort_by(|a, b| a.1.cmp(&b.1));

            let to_remove = entries.len().saturating_sub(self.max_entries);
            for (key, _) in entries.into_iter().take(to_remove) {
                self.entries.remove(&key);
            }
            debug!(removed = to_remove, "cache over capacity, dropped oldest");
        }
    }
}

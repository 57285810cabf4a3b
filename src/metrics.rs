//! Cache metrics and observability.
//!
//! Counters for cache lookups, content-service fetches and invalidations.
//! Each `ContentClient` owns one instance, so tests and multiple clients do not
//! share counters.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Reads served from a fresh cache entry
    cache_hits: AtomicUsize,

    /// Reads that found no entry or an expired one
    cache_misses: AtomicUsize,

    /// Requests sent to the content service
    fetches: AtomicUsize,

    /// Requests that failed (status, timeout, transport or decode)
    fetch_failures: AtomicUsize,

    /// Invalidation calls of any scope
    invalidations: AtomicUsize,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> usize {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self, cached_entries: usize) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_lookups = hits + misses;
        let cache_hit_rate = if total_lookups > 0 {
            (hits as f64 / total_lookups as f64) * 100.0
        } else {
            0.0
        };

        let fetches = self.fetches();
        let failures = self.fetch_failures();
        let fetch_success_rate = if fetches > 0 {
            (fetches.saturating_sub(failures) as f64 / fetches as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cached_entries,
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            fetches,
            fetch_failures: failures,
            fetch_success_rate,
            invalidations: self.invalidations(),
        }
    }
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Entries currently stored (fresh or not yet evicted)
    pub cached_entries: usize,

    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub fetches: usize,
    pub fetch_failures: usize,

    /// Fetch success rate as a percentage (0-100)
    pub fetch_success_rate: f64,

    pub invalidations: usize,
}

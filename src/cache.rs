//! In-memory TTL cache with request coalescing.
//!
//! Entries carry their own fetch timestamp and TTL. Staleness is checked on
//! every read (`now - fetched_at > ttl` means absent); nothing is evicted in
//! the background. Concurrent misses for the same key share a single load.

use crate::metrics::CacheMetrics;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// Millisecond wall clock used for entry timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

struct CacheEntry<V> {
    value: V,
    fetched_at_ms: i64,
    ttl_ms: i64,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.fetched_at_ms <= self.ttl_ms
    }
}

/// A load other callers can wait on. It holds the loader's outcome, failure
/// included, so waiters never start a load of their own.
type InFlight<V, E> = Arc<OnceCell<Result<V, E>>>;

pub struct TtlCache<V, E> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    /// Running loads by key. Invalidation drops matching slots, and a load
    /// whose slot is gone does not store its result.
    in_flight: Mutex<HashMap<String, InFlight<V, E>>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<CacheMetrics>,
}

impl<V, E> fmt::Debug for TtlCache<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = lock(&self.entries).len();
        let in_flight = lock(&self.in_flight).len();
        f.debug_struct("TtlCache")
            .field("entries", &entries)
            .field("in_flight", &in_flight)
            .finish()
    }
}

impl<V: Clone + Send + Sync, E: Clone + Send + Sync> TtlCache<V, E> {
    pub fn new(clock: Arc<dyn Clock>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            clock,
            metrics,
        }
    }

    /// Fresh value for `key`, if any. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();
        let mut entries = lock(&self.entries);

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.metrics.record_cache_hit();
                debug!("Cache hit for '{}'", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.metrics.record_cache_miss();
                debug!("Cache entry for '{}' expired", key);
                None
            }
            None => {
                self.metrics.record_cache_miss();
                debug!("Cache miss for '{}'", key);
                None
            }
        }
    }

    /// Store `value` under `key`, stamped with the current time.
    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            fetched_at_ms: self.clock.now_millis(),
            ttl_ms: ttl.as_millis() as i64,
        };
        lock(&self.entries).insert(key.to_string(), entry);
    }

    /// Return the cached value or run `loader` and cache its result.
    ///
    /// Callers arriving while a load for the same key is running wait for it
    /// and receive its outcome, error or not. Errors are never cached: the
    /// next caller after a failed load starts a fresh one.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let slot = Arc::clone(
            lock(&self.in_flight)
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );
        let own = &slot;

        let outcome = slot
            .get_or_init(move || async move {
                let result = loader().await;
                self.settle(key, own, &result, ttl);
                result
            })
            .await
            .clone();
        outcome
    }

    /// Retire a finished load, storing its value unless the key was
    /// invalidated while it ran.
    fn settle(&self, key: &str, slot: &InFlight<V, E>, result: &Result<V, E>, ttl: Duration) {
        let mut in_flight = lock(&self.in_flight);
        let current = in_flight
            .get(key)
            .is_some_and(|running| Arc::ptr_eq(running, slot));
        if !current {
            debug!("Cache for '{}' invalidated during load; not storing", key);
            return;
        }

        in_flight.remove(key);
        if let Ok(value) = result {
            self.insert(key, value.clone(), ttl);
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.metrics.record_invalidation();
        lock(&self.in_flight).remove(key);
        lock(&self.entries).remove(key).is_some()
    }

    /// Remove every entry whose key matches. Returns how many were removed.
    pub fn invalidate_where(&self, matches: impl Fn(&str) -> bool) -> usize {
        self.metrics.record_invalidation();
        lock(&self.in_flight).retain(|key, _| !matches(key));

        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|key, _| !matches(key));
        before - entries.len()
    }

    /// Remove everything. Returns how many entries were removed.
    pub fn clear(&self) -> usize {
        self.invalidate_where(|_| true)
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    const TTL: Duration = Duration::from_millis(300_000);

    fn cache_with_clock() -> (TtlCache<String, String>, Arc<ManualClock>, Arc<CacheMetrics>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let metrics = Arc::new(CacheMetrics::new());
        let cache = TtlCache::new(clock.clone(), metrics.clone());
        (cache, clock, metrics)
    }

    // ==================== TTL Tests ====================

    #[test]
    fn test_entry_fresh_until_ttl_elapses() {
        let (cache, clock, _) = cache_with_clock();
        cache.insert("translations", "payload".to_string(), TTL);

        clock.advance(Duration::from_millis(299_999));
        assert_eq!(cache.get("translations"), Some("payload".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("translations"), Some("payload".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("translations"), None);
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let (cache, clock, _) = cache_with_clock();
        cache.insert("media", "payload".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.get("media"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hits_and_misses_are_counted() {
        let (cache, _, metrics) = cache_with_clock();
        assert_eq!(cache.get("a"), None);
        cache.insert("a", "1".to_string(), TTL);
        assert!(cache.get("a").is_some());

        assert_eq!(metrics.cache_hits(), 1);
        assert_eq!(metrics.cache_misses(), 1);
    }

    // ==================== get_or_fetch Tests ====================

    #[tokio::test]
    async fn test_get_or_fetch_loads_once_then_serves_cache() {
        let (cache, clock, _) = cache_with_clock();
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        for _ in 0..3 {
            let value: Result<String, String> = cache
                .get_or_fetch("k", TTL, move || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok("v".to_string())
                })
                .await;
            assert_eq!(value.unwrap(), "v");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(300_001));
        let _: Result<String, String> = cache
            .get_or_fetch("k", TTL, move || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok("v2".to_string())
            })
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("k"), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_get_or_fetch_does_not_cache_errors() {
        let (cache, _, _) = cache_with_clock();

        let failed = cache
            .get_or_fetch("k", TTL, || async { Err("boom".to_string()) })
            .await;
        assert_eq!(failed.unwrap_err(), "boom");
        assert!(cache.is_empty());

        let ok = cache
            .get_or_fetch("k", TTL, || async { Ok("v".to_string()) })
            .await;
        assert_eq!(ok.unwrap(), "v");
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let (cache, _, _) = cache_with_clock();
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, String>("shared".to_string())
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch("k", TTL, load),
            cache.get_or_fetch("k", TTL, load),
            cache.get_or_fetch("k", TTL, load),
        );

        assert_eq!(a.unwrap(), "shared");
        assert_eq!(b.unwrap(), "shared");
        assert_eq!(c.unwrap(), "shared");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failed_load_is_shared() {
        let (cache, _, _) = cache_with_clock();
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Err::<String, _>("content service down".to_string())
        };

        let started = Instant::now();
        let (a, b, c, d) = tokio::join!(
            cache.get_or_fetch("k", TTL, load),
            cache.get_or_fetch("k", TTL, load),
            cache.get_or_fetch("k", TTL, load),
            cache.get_or_fetch("k", TTL, load),
        );
        let elapsed = started.elapsed();

        for result in [a, b, c, d] {
            assert_eq!(result.unwrap_err(), "content service down");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        // One shared load, not four in a row
        assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
        assert!(cache.is_empty());

        // The failure is not remembered
        let retried = cache
            .get_or_fetch("k", TTL, || async { Ok::<_, String>("back".to_string()) })
            .await;
        assert_eq!(retried.unwrap(), "back");
    }

    #[tokio::test]
    async fn test_invalidation_during_load_is_not_undone() {
        let (cache, _, _) = cache_with_clock();
        let shared = &cache;

        let value: Result<String, String> = cache
            .get_or_fetch("k", TTL, move || async move {
                // an invalidation lands while the request is in flight
                shared.clear();
                Ok("stale".to_string())
            })
            .await;

        assert_eq!(value.unwrap(), "stale");
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_invalidating_own_key_during_load_skips_store() {
        let (cache, _, _) = cache_with_clock();
        let shared = &cache;

        let value: Result<String, String> = cache
            .get_or_fetch("translations", TTL, move || async move {
                shared.invalidate("translations");
                Ok("stale".to_string())
            })
            .await;

        assert_eq!(value.unwrap(), "stale");
        assert_eq!(cache.get("translations"), None);
    }

    #[tokio::test]
    async fn test_unrelated_invalidation_during_load_still_stores() {
        let (cache, _, _) = cache_with_clock();
        let shared = &cache;
        cache.insert("media", "old".to_string(), TTL);

        let value: Result<String, String> = cache
            .get_or_fetch("translations", TTL, move || async move {
                shared.invalidate("media");
                shared.invalidate_where(|key| key.starts_with("navigation"));
                Ok("fresh".to_string())
            })
            .await;

        assert_eq!(value.unwrap(), "fresh");
        assert_eq!(cache.get("translations"), Some("fresh".to_string()));
        assert_eq!(cache.get("media"), None);
    }

    // ==================== Invalidation Tests ====================

    #[test]
    fn test_invalidate_single_key() {
        let (cache, _, metrics) = cache_with_clock();
        cache.insert("a", "1".to_string(), TTL);
        cache.insert("b", "2".to_string(), TTL);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.keys(), vec!["b".to_string()]);
        assert_eq!(metrics.invalidations(), 2);
    }

    #[test]
    fn test_invalidate_where() {
        let (cache, _, _) = cache_with_clock();
        cache.insert("translations", "1".to_string(), TTL);
        cache.insert("translations?locale=en", "2".to_string(), TTL);
        cache.insert("media", "3".to_string(), TTL);

        let removed = cache.invalidate_where(|key| key.starts_with("translations"));
        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["media".to_string()]);
    }

    #[test]
    fn test_clear() {
        let (cache, _, _) = cache_with_clock();
        cache.insert("a", "1".to_string(), TTL);
        cache.insert("b", "2".to_string(), TTL);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_system_clock_is_current() {
        let now = chrono::Utc::now().timestamp_millis();
        assert!((SystemClock.now_millis() - now).abs() < 5_000);
    }
}

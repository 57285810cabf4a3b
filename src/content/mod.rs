//! Content service client with an in-memory TTL cache.
//!
//! Collections are fetched with a bearer token and a bounded timeout, then
//! memoized under a canonical key built from the resource and its filters.
//! Key lookups never fail: a missing translation or an unreachable service
//! resolves to the key string itself, so untranslated content stays visible.

mod error;
mod model;
mod resource;

pub use error::FetchError;
pub use model::{
    translation_entries, Collection, HealthState, HealthStatus, NavigationItem, NavigationRecord,
    TranslationEntry,
};
pub use resource::{ContentResource, Filters};

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::{CacheTtls, Config};
use crate::i18n::Locale;
use crate::metrics::{CacheMetrics, MetricsReport};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Query used for navigation lookups. Pre-warming must use the same filters
/// so it fills the key readers hit.
pub fn navigation_filters() -> Filters {
    Filters::from([("populate".to_string(), "*".to_string())])
}

pub struct ContentClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
    ttls: CacheTtls,
    cache: TtlCache<Arc<Collection>, FetchError>,
    metrics: Arc<CacheMetrics>,
}

impl ContentClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Client whose cache timestamps come from `clock`.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.content_timeout)
            .build()
            .context("Failed to build content service HTTP client")?;
        let metrics = Arc::new(CacheMetrics::new());

        Ok(Self {
            http,
            base_url: config.content_api_url.trim_end_matches('/').to_string(),
            token: config.content_api_token.clone(),
            timeout: config.content_timeout,
            ttls: config.cache_ttls,
            cache: TtlCache::new(clock, metrics.clone()),
            metrics,
        })
    }

    /// Fetch a collection, serving it from the cache while fresh.
    ///
    /// On a miss the collection is requested from the content service and
    /// cached with the resource's TTL. Errors are not cached.
    pub async fn fetch_collection(
        &self,
        resource: ContentResource,
        filters: &Filters,
    ) -> Result<Arc<Collection>, FetchError> {
        let key = resource.cache_key(filters);
        let ttl = resource.ttl(&self.ttls);

        self.cache
            .get_or_fetch(&key, ttl, move || self.request(resource, filters))
            .await
    }

    /// All translation entries, cache-backed.
    pub async fn fetch_translations(&self) -> Result<Vec<TranslationEntry>, FetchError> {
        let collection = self
            .fetch_collection(ContentResource::Translations, &Filters::new())
            .await?;
        Ok(translation_entries(&collection))
    }

    /// Resolve one translation key for `locale`.
    ///
    /// Falls back through the other locales, then to `key` itself.
    pub async fn resolve_one(&self, key: &str, locale: Locale) -> String {
        match self.fetch_translations().await {
            Ok(entries) => {
                let index = index_entries(&entries);
                resolve_key(&index, key, locale)
            }
            Err(e) => {
                warn!("Translation lookup for '{}' degraded to key: {}", key, e);
                key.to_string()
            }
        }
    }

    /// Resolve several keys with one collection fetch. Each key resolves
    /// independently.
    pub async fn resolve_many<S: AsRef<str>>(
        &self,
        keys: &[S],
        locale: Locale,
    ) -> HashMap<String, String> {
        let entries = match self.fetch_translations().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Translation lookup for {} keys degraded to keys: {}",
                    keys.len(),
                    e
                );
                Vec::new()
            }
        };
        let index = index_entries(&entries);

        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                (key.to_string(), resolve_key(&index, key, locale))
            })
            .collect()
    }

    /// Active navigation items for `locale`, ordered by their `order` field.
    pub async fn fetch_navigation(&self, locale: Locale) -> Result<Vec<NavigationItem>, FetchError> {
        let collection = self
            .fetch_collection(ContentResource::NavigationItems, &navigation_filters())
            .await?;

        let mut records: Vec<NavigationRecord> = collection
            .data
            .iter()
            .filter_map(NavigationRecord::from_record)
            .filter(|record| record.is_active)
            .collect();
        records.sort_by_key(|record| record.order);

        Ok(records.iter().map(|record| record.localize(locale)).collect())
    }

    /// Remove one cache entry, or everything when `key` is `None`.
    /// Returns the number of entries removed.
    pub fn invalidate(&self, key: Option<&str>) -> usize {
        let removed = match key {
            Some(key) => usize::from(self.cache.invalidate(key)),
            None => self.cache.clear(),
        };
        info!(
            "Invalidated {} cache entries ({})",
            removed,
            key.unwrap_or("all")
        );
        removed
    }

    /// Remove every cached variant of `resource`, whatever its filters.
    pub fn invalidate_resource(&self, resource: ContentResource) -> usize {
        let removed = self.cache.invalidate_where(|key| resource.owns_key(key));
        info!("Invalidated {} cached '{}' entries", removed, resource);
        removed
    }

    /// Check that the content service answers. Never fails.
    pub async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let url = self.url(ContentResource::Translations);
        let probe = Filters::from([("pagination[pageSize]".to_string(), "1".to_string())]);

        let result = self.get_collection(&url, &probe).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthStatus {
                status: HealthState::Ok,
                message: "Content service reachable".to_string(),
                latency_ms,
                checked_at: Utc::now(),
            },
            Err(e) => {
                warn!("Content service health check failed: {}", e);
                HealthStatus {
                    status: HealthState::Error,
                    message: e.to_string(),
                    latency_ms,
                    checked_at: Utc::now(),
                }
            }
        }
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report(self.cache.len())
    }

    /// Keys currently held in the cache, sorted.
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    fn url(&self, resource: ContentResource) -> String {
        format!("{}{}", self.base_url, resource.path())
    }

    async fn request(
        &self,
        resource: ContentResource,
        filters: &Filters,
    ) -> Result<Arc<Collection>, FetchError> {
        let url = self.url(resource);
        self.metrics.record_fetch();

        match self.get_collection(&url, filters).await {
            Ok(collection) => {
                debug!("Fetched {} '{}' records", collection.len(), resource);
                Ok(Arc::new(collection))
            }
            Err(e) => {
                self.metrics.record_fetch_failure();
                Err(e)
            }
        }
    }

    async fn get_collection(&self, url: &str, query: &Filters) -> Result<Collection, FetchError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        response.json::<Collection>().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(url, e)
            } else {
                FetchError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Active entries by key; the first active entry wins on duplicates.
fn index_entries(entries: &[TranslationEntry]) -> HashMap<&str, &TranslationEntry> {
    let mut index = HashMap::with_capacity(entries.len());
    for entry in entries.iter().filter(|e| e.is_active) {
        index.entry(entry.key.as_str()).or_insert(entry);
    }
    index
}

fn resolve_key(index: &HashMap<&str, &TranslationEntry>, key: &str, locale: Locale) -> String {
    match index.get(key).and_then(|entry| entry.resolve(locale)) {
        Some(value) => value,
        None => {
            debug!("No translation for '{}' in any locale", key);
            key.to_string()
        }
    }
}

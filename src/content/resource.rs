//! Content resource types and canonical cache keys.

use crate::config::CacheTtls;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use urlencoding::encode;

/// Raw query parameters for a collection request, e.g.
/// `filters[category][$eq] = hero` or `populate = *`.
///
/// A `BTreeMap` keeps parameters sorted, which makes cache keys canonical.
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentResource {
    Translations,
    NavigationItems,
    Media,
    Navigation,
}

impl ContentResource {
    pub const ALL: [ContentResource; 4] = [
        ContentResource::Translations,
        ContentResource::NavigationItems,
        ContentResource::Media,
        ContentResource::Navigation,
    ];

    /// Collection name, also the cache key prefix.
    pub fn name(&self) -> &'static str {
        match self {
            ContentResource::Translations => "translations",
            ContentResource::NavigationItems => "navigation-items",
            ContentResource::Media => "media",
            ContentResource::Navigation => "navigation",
        }
    }

    /// Path on the content service.
    pub fn path(&self) -> String {
        format!("/api/{}", self.name())
    }

    pub fn ttl(&self, ttls: &CacheTtls) -> Duration {
        match self {
            ContentResource::Translations => ttls.translations,
            ContentResource::NavigationItems | ContentResource::Navigation => ttls.navigation,
            ContentResource::Media => ttls.media,
        }
    }

    /// Canonical cache key: the resource name, then sorted `k=v` pairs with
    /// both sides percent-encoded.
    pub fn cache_key(&self, filters: &Filters) -> String {
        if filters.is_empty() {
            return self.name().to_string();
        }

        let query = filters
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.name(), query)
    }

    /// Whether `key` was produced by `cache_key` for this resource.
    pub fn owns_key(&self, key: &str) -> bool {
        match key.strip_prefix(self.name()) {
            Some(rest) => rest.is_empty() || rest.starts_with('?'),
            None => false,
        }
    }
}

impl fmt::Display for ContentResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

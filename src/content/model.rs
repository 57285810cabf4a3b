//! Content service payloads and the records decoded from them.

use crate::i18n::{resolve_with_fallback, Locale};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Collection response envelope: `{ data: [...], meta?: {...} }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Record fields, whether flat or wrapped as `{ id, attributes: {...} }`.
fn fields(record: &Value) -> &Value {
    record.get("attributes").unwrap_or(record)
}

fn string_field<'a>(fields: &'a Value, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}

/// Values keyed by supported locale code, blank strings dropped.
fn locale_values(source: &Value) -> BTreeMap<String, String> {
    Locale::all()
        .into_iter()
        .filter_map(|locale| {
            string_field(source, locale.code())
                .filter(|v| !v.trim().is_empty())
                .map(|v| (locale.code().to_string(), v.to_string()))
        })
        .collect()
}

/// One translation key with its value per locale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationEntry {
    pub key: String,
    pub values: BTreeMap<String, String>,
    pub category: Option<String>,
    pub is_active: bool,
}

impl TranslationEntry {
    /// Decode a translation record. Records without a `key` are skipped.
    ///
    /// Locale values live in fields named after the locale code
    /// (`en`, `ru`, `he`); `isActive` defaults to true.
    pub fn from_record(record: &Value) -> Option<Self> {
        let fields = fields(record);
        let key = string_field(fields, "key")?.trim();
        if key.is_empty() {
            return None;
        }

        Some(Self {
            key: key.to_string(),
            values: locale_values(fields),
            category: string_field(fields, "category").map(str::to_string),
            is_active: fields
                .get("isActive")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
    }

    /// Value for `locale`, walking the fallback hierarchy. `None` when no
    /// locale is populated.
    pub fn resolve(&self, locale: Locale) -> Option<String> {
        Some(resolve_with_fallback(&self.values, locale)).filter(|v| !v.is_empty())
    }
}

/// Decode every usable translation record in a collection.
pub fn translation_entries(collection: &Collection) -> Vec<TranslationEntry> {
    collection
        .data
        .iter()
        .filter_map(TranslationEntry::from_record)
        .collect()
}

/// Navigation item as stored, with its label in every locale.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRecord {
    pub labels: BTreeMap<String, String>,
    pub href: String,
    pub order: i64,
    pub is_active: bool,
}

impl NavigationRecord {
    /// Decode a navigation item record.
    ///
    /// `label` is either a plain string (stored under the default locale) or
    /// an object keyed by locale code. `href` falls back to `url`.
    pub fn from_record(record: &Value) -> Option<Self> {
        let fields = fields(record);
        let href = string_field(fields, "href").or_else(|| string_field(fields, "url"))?;

        let labels = match fields.get("label") {
            Some(Value::String(label)) => {
                BTreeMap::from([(Locale::default_locale().code().to_string(), label.clone())])
            }
            Some(object @ Value::Object(_)) => locale_values(object),
            _ => BTreeMap::new(),
        };

        Some(Self {
            labels,
            href: href.to_string(),
            order: fields.get("order").and_then(Value::as_i64).unwrap_or(0),
            is_active: fields
                .get("isActive")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
    }

    pub fn localize(&self, locale: Locale) -> NavigationItem {
        let label = resolve_with_fallback(&self.labels, locale);
        NavigationItem {
            label: if label.is_empty() {
                self.href.clone()
            } else {
                label
            },
            href: self.href.clone(),
            order: self.order,
        }
    }
}

/// Navigation item with its label resolved for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationItem {
    pub label: String,
    pub href: String,
    pub order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Error,
}

/// Result of a content service connectivity check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub message: String,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == HealthState::Ok
    }
}

//! Browser language negotiation.
//!
//! Turns an `Accept-Language` header into an ordered preference list and
//! matches that list against the supported locales.

use crate::i18n::Locale;
use regex::Regex;
use std::sync::OnceLock;

/// BCP 47-ish tag: primary subtag plus optional subtags ("en", "en-US", "zh_Hant").
fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{1,8}(?:[-_][A-Za-z0-9]{1,8})*$").expect("static regex is valid")
    })
}

/// Parse an `Accept-Language` header into tags ordered by preference.
///
/// Tags are sorted by q-value, keeping header order for ties. Entries with
/// `q=0`, the `*` wildcard, and malformed tags are dropped. An unparsable
/// q-value counts as 1.0.
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = pieces.next()?.trim();
            if !tag_pattern().is_match(tag) {
                return None;
            }

            let quality = pieces
                .filter_map(|param| param.trim().strip_prefix("q="))
                .next()
                .map(|q| q.trim().parse::<f32>().unwrap_or(1.0))
                .unwrap_or(1.0);

            (quality > 0.0).then(|| (tag.to_string(), quality))
        })
        .collect();

    // sort_by is stable, so equal weights keep header order
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}

/// Match client preferences against the supported locales.
///
/// Exact matches across the whole list win over prefix matches, so
/// `["en-US", "ru"]` resolves to `ru` and `["en-US", "fr"]` to `en`.
pub fn negotiate(preferences: &[String]) -> Option<Locale> {
    let normalized: Vec<String> = preferences
        .iter()
        .map(|p| p.trim().to_ascii_lowercase().replace('_', "-"))
        .collect();

    normalized
        .iter()
        .find_map(|tag| Locale::from_code(tag).ok())
        .or_else(|| {
            normalized.iter().find_map(|tag| {
                let primary = tag.split('-').next().unwrap_or_default();
                Locale::from_code(primary).ok()
            })
        })
}

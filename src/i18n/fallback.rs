//! Locale fallback resolution.
//!
//! The hierarchy is the default order head-rotated so the requested locale is
//! tried first. The same hierarchy drives translation-key lookup and raw
//! multi-language content objects.

use crate::i18n::Locale;
use std::collections::BTreeMap;

/// `[locale, ...default order minus locale]`.
pub fn fallback_hierarchy(locale: Locale) -> Vec<Locale> {
    let mut hierarchy = Vec::with_capacity(3);
    hierarchy.push(locale);
    hierarchy.extend(Locale::all().into_iter().filter(|l| *l != locale));
    hierarchy
}

/// Resolve a multi-language value for `locale`.
///
/// Walks the fallback hierarchy and returns the first non-blank value. When no
/// supported locale has one, returns the first non-blank value in the map
/// regardless of its key, and finally an empty string.
pub fn resolve_with_fallback(translations: &BTreeMap<String, String>, locale: Locale) -> String {
    for candidate in fallback_hierarchy(locale) {
        if let Some(value) = non_blank(translations.get(candidate.code())) {
            return value.to_string();
        }
    }

    translations
        .values()
        .find(|value| !value.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Hierarchy Tests ====================

    #[test]
    fn test_hierarchy_for_default() {
        assert_eq!(
            fallback_hierarchy(Locale::ENGLISH),
            vec![Locale::ENGLISH, Locale::RUSSIAN, Locale::HEBREW]
        );
    }

    #[test]
    fn test_hierarchy_rotates_active_to_head() {
        assert_eq!(
            fallback_hierarchy(Locale::HEBREW),
            vec![Locale::HEBREW, Locale::ENGLISH, Locale::RUSSIAN]
        );
        assert_eq!(
            fallback_hierarchy(Locale::RUSSIAN),
            vec![Locale::RUSSIAN, Locale::ENGLISH, Locale::HEBREW]
        );
    }

    proptest! {
        #[test]
        fn prop_hierarchy_is_permutation_led_by_locale(index in 0usize..3) {
            let all = Locale::all();
            let locale = all[index];
            let hierarchy = fallback_hierarchy(locale);

            prop_assert_eq!(hierarchy[0], locale);
            prop_assert_eq!(hierarchy.len(), all.len());
            for supported in &all {
                prop_assert_eq!(hierarchy.iter().filter(|l| *l == supported).count(), 1);
            }
        }
    }

    // ==================== Resolution Tests ====================

    #[test]
    fn test_resolve_active_locale_first() {
        let values = map(&[("en", "Hello"), ("ru", "Привет"), ("he", "שלום")]);
        assert_eq!(resolve_with_fallback(&values, Locale::HEBREW), "שלום");
    }

    #[test]
    fn test_resolve_falls_back_across_hierarchy() {
        let values = map(&[("en", "Hi")]);
        assert_eq!(resolve_with_fallback(&values, Locale::RUSSIAN), "Hi");
    }

    #[test]
    fn test_resolve_skips_blank_values() {
        let values = map(&[("he", "  "), ("en", ""), ("ru", "Привет")]);
        assert_eq!(resolve_with_fallback(&values, Locale::HEBREW), "Привет");
    }

    #[test]
    fn test_resolve_uses_any_value_when_no_locale_matches() {
        let values = map(&[("fr", "Bonjour"), ("de", "")]);
        assert_eq!(resolve_with_fallback(&values, Locale::ENGLISH), "Bonjour");
    }

    #[test]
    fn test_resolve_empty_map() {
        assert_eq!(resolve_with_fallback(&BTreeMap::new(), Locale::ENGLISH), "");
    }
}

//! Language registry: Single source of truth for all supported locales.
//!
//! This module provides a centralized registry of every locale the site can be
//! rendered in. It uses a singleton pattern with `OnceLock`: the table is
//! immutable and built once on first access.

use crate::i18n::Locale;
use serde::Serialize;
use std::sync::OnceLock;

/// Layout direction of a locale's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    /// Value for the HTML `dir` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, TextDirection::Rtl)
    }
}

/// Display metadata for a supported locale.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "he")
    pub code: &'static str,

    /// English name of the language (e.g., "Hebrew")
    pub name: &'static str,

    /// Name of the language in its own script (e.g., "עברית")
    pub native_name: &'static str,

    /// Text direction of the script
    pub direction: TextDirection,

    /// Flag emoji shown in the language switcher
    pub flag: &'static str,

    /// Whether this is the default locale (exactly one should be true)
    pub is_default: bool,
}

/// Global language registry singleton.
///
/// The order of `languages` is the default fallback order.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    ///
    /// # Returns
    /// * `Some(&LanguageConfig)` if the code is supported
    /// * `None` otherwise
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get the configuration for a validated locale.
    ///
    /// A `Locale` can only be built from a registered code, so this never
    /// misses.
    pub fn get_config(&self, locale: Locale) -> &LanguageConfig {
        self.get_by_code(locale.code())
            .unwrap_or_else(|| self.default_config())
    }

    /// All locales, in default fallback order.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    /// Codes of all locales, in default fallback order.
    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.languages.iter().map(|lang| lang.code)
    }

    /// Get the default locale configuration.
    ///
    /// # Panics
    /// Panics if the table does not define exactly one default. This is a
    /// static configuration error caught by the unit tests.
    pub fn default_config(&self) -> &LanguageConfig {
        let defaults: Vec<_> = self
            .languages
            .iter()
            .filter(|lang| lang.is_default)
            .collect();

        match defaults.len() {
            0 => panic!("No default language found in registry"),
            1 => defaults[0],
            _ => panic!("Multiple default languages found in registry"),
        }
    }

    /// Check if a language code is supported.
    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }
}

/// Supported locales in default fallback order: English, Russian, Hebrew.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            name: "English",
            native_name: "English",
            direction: TextDirection::Ltr,
            flag: "🇺🇸",
            is_default: true,
        },
        LanguageConfig {
            code: "ru",
            name: "Russian",
            native_name: "Русский",
            direction: TextDirection::Ltr,
            flag: "🇷🇺",
            is_default: false,
        },
        LanguageConfig {
            code: "he",
            name: "Hebrew",
            native_name: "עברית",
            direction: TextDirection::Rtl,
            flag: "🇮🇱",
            is_default: false,
        },
    ]
}

//! Locale type: validated, copyable locale representation.
//!
//! A `Locale` can only be constructed from a code present in the registry, so
//! every lookup that takes a `Locale` is infallible.

use crate::i18n::{LanguageConfig, LanguageRegistry, TextDirection};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocaleError {
    #[error("Unknown locale code: '{0}'")]
    Unknown(String),
}

/// A validated locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locale {
    /// ISO 639-1 language code (e.g., "en", "he")
    code: &'static str,
}

impl Locale {
    pub const ENGLISH: Locale = Locale { code: "en" };
    pub const RUSSIAN: Locale = Locale { code: "ru" };
    pub const HEBREW: Locale = Locale { code: "he" };

    /// Create a Locale from a language code string.
    ///
    /// Matching is exact and case-sensitive after trimming; callers that deal
    /// with browser tags should go through negotiation instead.
    pub fn from_code(code: &str) -> Result<Locale, LocaleError> {
        LanguageRegistry::get()
            .get_by_code(code.trim())
            .map(|config| Locale { code: config.code })
            .ok_or_else(|| LocaleError::Unknown(code.to_string()))
    }

    /// The fixed default locale.
    pub fn default_locale() -> Locale {
        Locale {
            code: LanguageRegistry::get().default_config().code,
        }
    }

    /// All supported locales, in default fallback order.
    pub fn all() -> Vec<Locale> {
        LanguageRegistry::get()
            .codes()
            .map(|code| Locale { code })
            .collect()
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Full display metadata from the registry.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get().get_config(*self)
    }

    pub fn name(&self) -> &'static str {
        self.config().name
    }

    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    pub fn direction(&self) -> TextDirection {
        self.config().direction
    }

    pub fn is_default(&self) -> bool {
        self.config().is_default
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::default_locale()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::from_code(s)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code)
    }
}

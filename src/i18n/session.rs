//! Language session manager.
//!
//! Resolves the active locale for one client session (stored preference, then
//! browser negotiation, then the default), persists changes to session storage
//! and notifies subscribers. Instances are constructed explicitly; the HTTP
//! layer builds one per request.

use crate::i18n::fallback;
use crate::i18n::negotiate::{negotiate, parse_accept_language};
use crate::i18n::{Locale, TextDirection};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Session storage key holding the chosen language code.
pub const LANGUAGE_STORAGE_KEY: &str = "aistudio555_language";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session storage unavailable: {0}")]
    Unavailable(String),
}

/// Session-scoped key-value storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory session storage.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a language preference (e.g. from a cookie).
    pub fn with_language(code: &str) -> Self {
        let store = Self::new();
        lock(&store.values).insert(LANGUAGE_STORAGE_KEY.to_string(), code.to_string());
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Attributes the page root should carry for a locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentAttributes {
    pub lang: &'static str,
    pub dir: TextDirection,
    pub rtl: bool,
}

impl DocumentAttributes {
    pub fn for_locale(locale: Locale) -> Self {
        let dir = locale.direction();
        Self {
            lang: locale.code(),
            dir,
            rtl: dir.is_rtl(),
        }
    }
}

/// Receives document attributes whenever the active locale is resolved or changed.
pub trait DocumentHook: Send + Sync {
    fn apply(&self, attributes: &DocumentAttributes);
}

type Listener = Arc<dyn Fn(Locale) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`LanguageSession::subscribe`].
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the listener. A no-op once the session is gone.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct LanguageSession {
    store: Arc<dyn SessionStore>,
    preferred_languages: Vec<String>,
    /// `None` until initialized.
    current: Mutex<Option<Locale>>,
    listeners: Arc<Mutex<Listeners>>,
    document_hook: Option<Box<dyn DocumentHook>>,
}

impl LanguageSession {
    /// Create an uninitialized session.
    ///
    /// `preferred_languages` is the client's declared preference list, most
    /// preferred first.
    pub fn new(store: Arc<dyn SessionStore>, preferred_languages: Vec<String>) -> Self {
        Self {
            store,
            preferred_languages,
            current: Mutex::new(None),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            document_hook: None,
        }
    }

    /// Create a session whose preferences come from an `Accept-Language` header.
    pub fn from_accept_language(store: Arc<dyn SessionStore>, header: Option<&str>) -> Self {
        let preferences = header.map(parse_accept_language).unwrap_or_default();
        Self::new(store, preferences)
    }

    pub fn with_document_hook(mut self, hook: impl DocumentHook + 'static) -> Self {
        self.document_hook = Some(Box::new(hook));
        self
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.current).is_some()
    }

    /// Resolve the active locale. Only the first call runs detection.
    pub fn initialize(&self) -> Locale {
        let locale = {
            let mut current = lock(&self.current);
            if let Some(locale) = *current {
                return locale;
            }
            let locale = self.detect();
            *current = Some(locale);
            locale
        };

        self.persist(locale);
        self.apply_document_hook(locale);
        debug!("Language session initialized with '{}'", locale);
        locale
    }

    /// The active locale, initializing on first access.
    pub fn current(&self) -> Locale {
        if let Some(locale) = *lock(&self.current) {
            return locale;
        }
        self.initialize()
    }

    /// Change the active locale.
    ///
    /// Unsupported codes are replaced by the default locale with a warning.
    /// Subscribers run after the new locale is readable through `current()`.
    pub fn set_language(&self, code: &str) -> Locale {
        let locale = match Locale::from_code(code) {
            Ok(locale) => locale,
            Err(e) => {
                let fallback = Locale::default_locale();
                warn!("{}; using default language '{}'", e, fallback);
                fallback
            }
        };

        *lock(&self.current) = Some(locale);
        self.persist(locale);
        self.apply_document_hook(locale);
        debug!("Language changed to '{}'", locale);

        self.notify(locale);
        locale
    }

    /// Register a listener for language changes.
    pub fn subscribe(&self, listener: impl Fn(Locale) + Send + Sync + 'static) -> Subscription {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Fallback order for `locale`, or for the active locale when `None`.
    pub fn fallback_hierarchy(&self, locale: Option<Locale>) -> Vec<Locale> {
        fallback::fallback_hierarchy(locale.unwrap_or_else(|| self.current()))
    }

    /// Resolve a multi-language value, defaulting to the active locale.
    pub fn resolve_with_fallback(
        &self,
        translations: &BTreeMap<String, String>,
        locale: Option<Locale>,
    ) -> String {
        fallback::resolve_with_fallback(translations, locale.unwrap_or_else(|| self.current()))
    }

    pub fn document_attributes(&self) -> DocumentAttributes {
        DocumentAttributes::for_locale(self.current())
    }

    fn detect(&self) -> Locale {
        match self.store.get(LANGUAGE_STORAGE_KEY) {
            Ok(Some(stored)) => match Locale::from_code(&stored) {
                Ok(locale) => {
                    debug!("Using stored language preference '{}'", locale);
                    return locale;
                }
                Err(e) => warn!("Ignoring stored language preference: {}", e),
            },
            Ok(None) => {}
            Err(e) => {
                warn!("Language detection failed ({}); using default", e);
                return Locale::default_locale();
            }
        }

        match negotiate(&self.preferred_languages) {
            Some(locale) => {
                debug!(
                    "Negotiated '{}' from client preferences {:?}",
                    locale, self.preferred_languages
                );
                locale
            }
            None => Locale::default_locale(),
        }
    }

    fn persist(&self, locale: Locale) {
        if let Err(e) = self.store.set(LANGUAGE_STORAGE_KEY, locale.code()) {
            warn!("Failed to persist language '{}': {}", locale, e);
        }
    }

    fn apply_document_hook(&self, locale: Locale) {
        if let Some(hook) = &self.document_hook {
            hook.apply(&DocumentAttributes::for_locale(locale));
        }
    }

    fn notify(&self, locale: Locale) {
        // Snapshot so listeners may subscribe, unsubscribe or read state.
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(locale))) {
                error!(
                    "Language change listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Internationalization (i18n) module for locale handling.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for supported locales and their display metadata
//! - `locale`: Type-safe `Locale` validated against the registry
//! - `fallback`: Fallback hierarchy and multi-language value resolution
//! - `negotiate`: `Accept-Language` parsing and matching
//! - `session`: Per-client language session (detection, persistence, change notifications)
//!
//! # Example
//!
//! ```rust,ignore
//! use aistudio_content::i18n::{LanguageSession, Locale, MemorySessionStore};
//! use std::sync::Arc;
//!
//! let session = LanguageSession::from_accept_language(
//!     Arc::new(MemorySessionStore::new()),
//!     Some("he-IL,he;q=0.9"),
//! );
//! assert_eq!(session.current(), Locale::HEBREW);
//! ```

mod fallback;
mod locale;
mod negotiate;
mod registry;
mod session;

pub use fallback::{fallback_hierarchy, resolve_with_fallback};
pub use locale::{Locale, LocaleError};
pub use negotiate::{negotiate, parse_accept_language};
pub use registry::{LanguageConfig, LanguageRegistry, TextDirection};
pub use session::{
    DocumentAttributes, DocumentHook, LanguageSession, MemorySessionStore, SessionStore,
    StorageError, Subscription, LANGUAGE_STORAGE_KEY,
};

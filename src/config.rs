use anyhow::{Context, Result};
use std::time::Duration;

/// Critical keys refetched after a publish event when `PREWARM_KEYS` is unset.
pub const DEFAULT_PREWARM_KEYS: &[&str] = &[
    "nav.home",
    "nav.courses",
    "nav.pricing",
    "nav.about",
    "nav.contact",
    "hero.title",
    "hero.subtitle",
    "cta.enroll",
    "footer.copyright",
];

/// Time-to-live per content resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub translations: Duration,
    /// Applies to both navigation items and the navigation tree
    pub navigation: Duration,
    pub media: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            translations: Duration::from_secs(5 * 60),
            navigation: Duration::from_secs(10 * 60),
            media: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Content service
    pub content_api_url: String,
    pub content_api_token: String,
    pub content_timeout: Duration,

    // Cache
    pub cache_ttls: CacheTtls,
    pub prewarm_enabled: bool,
    pub prewarm_keys: Vec<String>,

    // Webhook
    /// Unset means every webhook call is rejected
    pub webhook_secret: Option<String>,

    // Server
    pub port: u16,
}

impl Config {
    /// Configuration with defaults for everything except the content service.
    pub fn new(content_api_url: &str, content_api_token: &str) -> Self {
        Self {
            content_api_url: content_api_url.trim_end_matches('/').to_string(),
            content_api_token: content_api_token.to_string(),
            content_timeout: Duration::from_secs(10),
            cache_ttls: CacheTtls::default(),
            prewarm_enabled: true,
            prewarm_keys: DEFAULT_PREWARM_KEYS.iter().map(|k| k.to_string()).collect(),
            webhook_secret: None,
            port: 8080,
        }
    }

    pub fn from_env() -> Result<Self> {
        let defaults = CacheTtls::default();

        let mut config = Self::new(
            &std::env::var("CONTENT_API_URL").context("CONTENT_API_URL not set")?,
            &std::env::var("CONTENT_API_TOKEN").context("CONTENT_API_TOKEN not set")?,
        );

        config.content_timeout = Duration::from_secs(env_parse("CONTENT_TIMEOUT_SECS", 10)?);
        config.cache_ttls = CacheTtls {
            translations: Duration::from_secs(env_parse(
                "TRANSLATIONS_TTL_SECS",
                defaults.translations.as_secs(),
            )?),
            navigation: Duration::from_secs(env_parse(
                "NAVIGATION_TTL_SECS",
                defaults.navigation.as_secs(),
            )?),
            media: Duration::from_secs(env_parse("MEDIA_TTL_SECS", defaults.media.as_secs())?),
        };

        config.prewarm_enabled = env_parse("PREWARM_ENABLED", true)?;
        if let Ok(keys) = std::env::var("PREWARM_KEYS") {
            config.prewarm_keys = keys
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }

        config.webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        config.port = env_parse("PORT", 8080)?;

        Ok(config)
    }
}

/// Parse an optional environment variable, using `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "CONTENT_API_URL",
        "CONTENT_API_TOKEN",
        "CONTENT_TIMEOUT_SECS",
        "TRANSLATIONS_TTL_SECS",
        "NAVIGATION_TTL_SECS",
        "MEDIA_TTL_SECS",
        "PREWARM_ENABLED",
        "PREWARM_KEYS",
        "WEBHOOK_SECRET",
        "PORT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = Config::new("https://cms.example.com/", "token");

        assert_eq!(config.content_api_url, "https://cms.example.com");
        assert_eq!(config.content_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_ttls, CacheTtls::default());
        assert!(config.prewarm_enabled);
        assert!(config.prewarm_keys.contains(&"hero.title".to_string()));
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_default_ttls() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.translations, Duration::from_millis(300_000));
        assert_eq!(ttls.navigation, Duration::from_secs(600));
        assert_eq!(ttls.media, Duration::from_secs(900));
    }

    #[test]
    #[serial]
    fn test_from_env_requires_content_api() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("CONTENT_API_URL"));

        std::env::set_var("CONTENT_API_URL", "https://cms.example.com");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("CONTENT_API_TOKEN"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        clear_env();
        std::env::set_var("CONTENT_API_URL", "https://cms.example.com/");
        std::env::set_var("CONTENT_API_TOKEN", "secret-token");
        std::env::set_var("CONTENT_TIMEOUT_SECS", "3");
        std::env::set_var("TRANSLATIONS_TTL_SECS", "60");
        std::env::set_var("PREWARM_ENABLED", "false");
        std::env::set_var("PREWARM_KEYS", "hero.title, nav.home,,");
        std::env::set_var("WEBHOOK_SECRET", "hook");
        std::env::set_var("PORT", "9090");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.content_api_url, "https://cms.example.com");
        assert_eq!(config.content_api_token, "secret-token");
        assert_eq!(config.content_timeout, Duration::from_secs(3));
        assert_eq!(config.cache_ttls.translations, Duration::from_secs(60));
        assert_eq!(config.cache_ttls.media, Duration::from_secs(900));
        assert!(!config.prewarm_enabled);
        assert_eq!(config.prewarm_keys, vec!["hero.title", "nav.home"]);
        assert_eq!(config.webhook_secret.as_deref(), Some("hook"));
        assert_eq!(config.port, 9090);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_blank_secret_is_unset() {
        clear_env();
        std::env::set_var("CONTENT_API_URL", "https://cms.example.com");
        std::env::set_var("CONTENT_API_TOKEN", "t");
        std::env::set_var("WEBHOOK_SECRET", "   ");

        let config = Config::from_env().unwrap();
        assert!(config.webhook_secret.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_invalid_number() {
        clear_env();
        std::env::set_var("CONTENT_API_URL", "https://cms.example.com");
        std::env::set_var("CONTENT_API_TOKEN", "t");
        std::env::set_var("PORT", "not-a-port");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        clear_env();
    }
}

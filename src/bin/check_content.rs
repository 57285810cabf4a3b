//! Content check binary - probes the content service and resolves keys in
//! every supported locale without starting the server.
//!
//! Usage:
//!   cargo run --bin check-content                     # Health check + default critical keys
//!   cargo run --bin check-content -- hero.title nav.home
//!
//! Required environment variables:
//! - CONTENT_API_URL
//! - CONTENT_API_TOKEN
//!
//! Optional:
//! - CONTENT_TIMEOUT_SECS (defaults to 10)
//! - PREWARM_KEYS (used when no keys are given)

use aistudio_content::{config::Config, content::ContentClient, i18n::Locale};
use anyhow::{bail, Result};
use futures::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Library logs only when something is off; this binary's own summary at info.
fn log_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("aistudio_content=warn".parse()?)
        .add_directive("check_content=info".parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt().with_env_filter(log_filter()?).init();

    let config = Config::from_env()?;
    let client = ContentClient::new(&config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let keys = if args.is_empty() {
        config.prewarm_keys.clone()
    } else {
        args
    };

    let health = client.health_check().await;
    println!(
        "Content service {}: {} ({}ms)",
        config.content_api_url, health.message, health.latency_ms
    );
    if !health.is_ok() {
        bail!("Content service is not healthy");
    }

    let locales = Locale::all();
    let results = join_all(
        locales
            .iter()
            .map(|locale| client.resolve_many(&keys, *locale)),
    )
    .await;

    let mut unresolved = 0;
    for key in &keys {
        println!("\n{}", key);
        for (locale, values) in locales.iter().zip(&results) {
            let value = values.get(key).map(String::as_str).unwrap_or(key);
            if value == key {
                unresolved += 1;
            }
            println!("  {:<3} {}", locale.code(), value);
        }
    }

    let report = client.metrics();
    info!("Fetches: {}, cache hits: {}", report.fetches, report.cache_hits);
    println!(
        "\n{} keys x {} locales, {} unresolved",
        keys.len(),
        locales.len(),
        unresolved
    );

    Ok(())
}

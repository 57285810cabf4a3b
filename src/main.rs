use aistudio_content::{config::Config, server};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aistudio_content=info".parse()?),
        )
        .init();

    info!("Starting content cache service");

    let config = Config::from_env()?;
    if config.webhook_secret.is_none() {
        warn!("WEBHOOK_SECRET is not set; webhook and cache control calls will be rejected");
    }
    info!(
        "Content service at {} (timeout {:?}, translations TTL {:?})",
        config.content_api_url, config.content_timeout, config.cache_ttls.translations
    );

    let state = Arc::new(server::AppState::new(config)?);

    // Startup check only; the service keeps running on a degraded backend
    let health = state.content.health_check().await;
    if health.is_ok() {
        info!("Content service reachable ({}ms)", health.latency_ms);
    } else {
        warn!("Content service unavailable at startup: {}", health.message);
    }

    server::serve(state).await
}

//! HTTP surface: content lookups, the language session, cache control and
//! the change webhook.

use crate::config::Config;
use crate::content::{ContentClient, FetchError, HealthStatus, NavigationItem};
use crate::i18n::{
    DocumentAttributes, LanguageConfig, LanguageRegistry, LanguageSession, Locale, LocaleError,
    MemorySessionStore, SessionStore, TextDirection, LANGUAGE_STORAGE_KEY,
};
use crate::metrics::MetricsReport;
use crate::security::verify_shared_secret;
use crate::webhook::{self, provided_secret};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        header::{ACCEPT_LANGUAGE, COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state, created at startup and dropped at shutdown.
pub struct AppState {
    pub config: Config,
    pub content: ContentClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let content = ContentClient::new(&config)?;
        Ok(Self::with_content(config, content))
    }

    pub fn with_content(config: Config, content: ContentClient) -> Self {
        Self { config, content }
    }
}

// Errors

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    UnsupportedLocale(#[from] LocaleError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::UnsupportedLocale(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }

        let body = ApiErrorResponse {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// Request language

/// Value of the language cookie, if the request carries one.
pub fn language_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == LANGUAGE_STORAGE_KEY)
        .map(|(_, value)| value.trim().to_string())
}

/// Language session for one request: the cookie acts as session storage and
/// `Accept-Language` as the client's preference list.
pub fn request_session(headers: &HeaderMap) -> LanguageSession {
    let store: Arc<dyn SessionStore> = match language_cookie(headers) {
        Some(code) => Arc::new(MemorySessionStore::with_language(&code)),
        None => Arc::new(MemorySessionStore::new()),
    };
    let accept_language = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
    LanguageSession::from_accept_language(store, accept_language)
}

/// Explicit `locale` parameter, else the request's session language.
fn request_locale(headers: &HeaderMap, requested: Option<&str>) -> ApiResult<Locale> {
    match requested.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => Ok(Locale::from_code(code)?),
        None => Ok(request_session(headers).current()),
    }
}

fn language_cookie_header(locale: Locale) -> String {
    format!(
        "{}={}; Path=/; SameSite=Lax",
        LANGUAGE_STORAGE_KEY,
        locale.code()
    )
}

// Request/response types

#[derive(Debug, Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslationResponse {
    pub key: String,
    pub locale: Locale,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub keys: Vec<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub locale: Locale,
    pub values: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub locale: Locale,
    pub items: Vec<NavigationItem>,
}

#[derive(Debug, Serialize)]
pub struct LanguageState {
    pub locale: Locale,
    pub direction: TextDirection,
    pub document: DocumentAttributes,
    pub languages: Vec<&'static LanguageConfig>,
}

impl LanguageState {
    fn for_locale(locale: Locale) -> Self {
        Self {
            locale,
            direction: locale.direction(),
            document: DocumentAttributes::for_locale(locale),
            languages: LanguageRegistry::get().list_all(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetLanguageRequest {
    pub locale: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub removed: usize,
    pub key: Option<String>,
}

// Handlers

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthStatus>) {
    let status = state.content.health_check().await;
    let code = if status.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn get_translation(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<LocaleQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<TranslationResponse>> {
    let locale = request_locale(&headers, query.locale.as_deref())?;
    let value = state.content.resolve_one(&key, locale).await;
    Ok(Json(TranslationResponse { key, locale, value }))
}

async fn resolve_translations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolveResponse>> {
    let locale = request_locale(&headers, request.locale.as_deref())?;
    let values = state.content.resolve_many(&request.keys, locale).await;
    Ok(Json(ResolveResponse { locale, values }))
}

async fn get_navigation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocaleQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<NavigationResponse>> {
    let locale = request_locale(&headers, query.locale.as_deref())?;
    let items = state.content.fetch_navigation(locale).await?;
    Ok(Json(NavigationResponse { locale, items }))
}

/// Current language. A request without a matching cookie gets one, so the
/// negotiated language sticks for later requests.
async fn get_language(headers: HeaderMap) -> Response {
    let locale = request_session(&headers).current();
    let body = Json(LanguageState::for_locale(locale));

    if language_cookie(&headers).as_deref() == Some(locale.code()) {
        body.into_response()
    } else {
        ([(SET_COOKIE, language_cookie_header(locale))], body).into_response()
    }
}

async fn set_language(
    headers: HeaderMap,
    Json(request): Json<SetLanguageRequest>,
) -> impl IntoResponse {
    let session = request_session(&headers);
    let locale = session.set_language(&request.locale);
    (
        [(SET_COOKIE, language_cookie_header(locale))],
        Json(LanguageState::for_locale(locale)),
    )
}

async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<InvalidateResponse>> {
    if !verify_shared_secret(state.config.webhook_secret.as_deref(), provided_secret(&headers)) {
        return Err(ApiError::Unauthorized("invalid cache control secret".to_string()));
    }

    let request: InvalidateRequest = if body.is_empty() {
        InvalidateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidInput(e.to_string()))?
    };

    let removed = state.content.invalidate(request.key.as_deref());
    Ok(Json(InvalidateResponse {
        success: true,
        removed,
        key: request.key,
    }))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<MetricsReport> {
    Json(state.content.metrics())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/translations/resolve", post(resolve_translations))
        .route("/api/translations/:key", get(get_translation))
        .route("/api/navigation", get(get_navigation))
        .route("/api/language", get(get_language).put(set_language))
        .route("/api/cache/invalidate", post(invalidate_cache))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/webhooks/content", post(webhook::content_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

//! Content change webhook: authenticates the caller, purges the affected
//! cache entries and, for publish events, pre-warms them.

use crate::config::Config;
use crate::content::{navigation_filters, ContentClient, ContentResource};
use crate::retry::{retry, RetryPolicy};
use crate::security::verify_shared_secret;
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const SECRET_HEADER: &str = "x-webhook-secret";

pub const PUBLISH_EVENT: &str = "entry.publish";

// Webhook types

/// Change notification sent by the content service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub model: String,
    #[serde(default)]
    pub entry: Value,
}

/// Content types the gateway knows how to invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentModel {
    Translation,
    NavigationItem,
    Media,
}

impl ContentModel {
    pub fn parse(model: &str) -> Option<Self> {
        match model.trim() {
            "translation" => Some(ContentModel::Translation),
            "navigation-item" => Some(ContentModel::NavigationItem),
            "media" => Some(ContentModel::Media),
            _ => None,
        }
    }

    /// Cached resources a change to this model makes stale.
    pub fn resources(&self) -> &'static [ContentResource] {
        match self {
            ContentModel::Translation => &[ContentResource::Translations],
            ContentModel::NavigationItem => {
                &[ContentResource::NavigationItems, ContentResource::Navigation]
            }
            ContentModel::Media => &[ContentResource::Media],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ContentModel::Translation => "translations",
            ContentModel::NavigationItem => "navigation",
            ContentModel::Media => "media",
        }
    }

    fn prewarms_on_publish(&self) -> bool {
        matches!(self, ContentModel::Translation | ContentModel::NavigationItem)
    }
}

/// Success acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
    pub event: String,
    pub model: String,
    #[serde(skip)]
    pub invalidated: usize,
    /// Model to pre-warm once the acknowledgement is on its way.
    #[serde(skip)]
    pub prewarm: Option<ContentModel>,
}

#[derive(Debug, Clone, Serialize)]
struct WebhookRejection {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn reject(status: StatusCode, message: &str, error: Option<String>) -> Response {
    let body = WebhookRejection {
        success: false,
        message: message.to_string(),
        error,
    };
    (status, Json(body)).into_response()
}

/// Secret sent in `x-webhook-secret`, if readable.
pub fn provided_secret(headers: &HeaderMap) -> Option<&str> {
    headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok())
}

/// `POST /api/webhooks/content`
pub async fn content_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !verify_shared_secret(state.config.webhook_secret.as_deref(), provided_secret(&headers)) {
        warn!("Rejected content webhook: missing or invalid secret");
        return reject(StatusCode::UNAUTHORIZED, "Unauthorized", None);
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to parse content webhook body: {}", e);
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Webhook processing failed",
                Some(e.to_string()),
            );
        }
    };

    let ack = handle_event(&state.config, &state.content, payload);
    if let Some(model) = ack.prewarm {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            prewarm(&state.config, &state.content, model).await;
        });
    }
    (StatusCode::OK, Json(ack)).into_response()
}

/// Apply an authenticated change notification to the cache.
///
/// Only invalidates. When the event calls for a pre-warm the returned ack
/// names the model, and the caller runs [`prewarm`] after responding.
pub fn handle_event(config: &Config, content: &ContentClient, payload: WebhookPayload) -> WebhookAck {
    info!(
        "Content webhook: event={} model={} created_at={}",
        payload.event,
        payload.model,
        payload
            .created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );

    let Some(model) = ContentModel::parse(&payload.model) else {
        debug!("Ignoring webhook for unhandled model '{}'", payload.model);
        return WebhookAck {
            success: true,
            message: format!("Ignored model '{}'", payload.model),
            event: payload.event,
            model: payload.model,
            invalidated: 0,
            prewarm: None,
        };
    };

    let invalidated: usize = model
        .resources()
        .iter()
        .map(|resource| content.invalidate_resource(*resource))
        .sum();

    let mut message = format!("Invalidated {} cache", model.label());
    let mut prewarm = None;
    if payload.event == PUBLISH_EVENT && model.prewarms_on_publish() {
        if config.prewarm_enabled {
            message.push_str(", pre-warm scheduled");
            prewarm = Some(model);
        } else {
            debug!("Pre-warm disabled, skipping");
        }
    }

    WebhookAck {
        success: true,
        message,
        event: payload.event,
        model: payload.model,
        invalidated,
        prewarm,
    }
}

/// Refetch what readers of `model` will hit next. Returns whether every
/// collection was refilled; failures are only logged.
pub async fn prewarm(config: &Config, content: &ContentClient, model: ContentModel) -> bool {
    let policy = RetryPolicy::prewarm();
    match model {
        ContentModel::Translation => {
            let result = retry(&policy, "Pre-warm translations", || {
                content.fetch_translations()
            })
            .await;

            match result {
                Ok(entries) => {
                    let missing: Vec<&str> = config
                        .prewarm_keys
                        .iter()
                        .map(String::as_str)
                        .filter(|key| !entries.iter().any(|e| e.is_active && e.key == *key))
                        .collect();
                    if !missing.is_empty() {
                        warn!("Critical translation keys missing after publish: {:?}", missing);
                    }
                    info!(
                        "Pre-warmed {} translations ({} of {} critical keys present)",
                        entries.len(),
                        config.prewarm_keys.len() - missing.len(),
                        config.prewarm_keys.len()
                    );
                    true
                }
                Err(e) => {
                    warn!("Pre-warm of translations failed: {}", e);
                    false
                }
            }
        }
        ContentModel::NavigationItem => {
            let filters = navigation_filters();
            let mut warmed = true;
            for resource in model.resources() {
                let label = format!("Pre-warm {}", resource);
                let result = retry(&policy, &label, || {
                    content.fetch_collection(*resource, &filters)
                })
                .await;

                match result {
                    Ok(collection) => info!("Pre-warmed {} {} records", collection.len(), resource),
                    Err(e) => {
                        warn!("Pre-warm of {} failed: {}", resource, e);
                        warmed = false;
                    }
                }
            }
            warmed
        }
        ContentModel::Media => false,
    }
}

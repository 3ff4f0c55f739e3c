// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the form intake service.

use crate::auth::{StaticTokens, Subject, SubjectResolver};
use crate::config::Config;
use crate::email::{LogMailer, SubmissionEmail};
use crate::error::{ErrorEnvelope, IngestError, SuccessEnvelope};
use crate::ingest::{IngestService, SubmissionRequest};
use crate::limiter::RateLimiters;
use crate::metadata::client_ip;
use crate::metrics::Metrics;
use crate::models::FieldMap;
use crate::notify::{NotificationPool, NotificationQueue, Notifier};
use crate::spam::SpamScorer;
use crate::store::MemoryStore;
use crate::webhook::WebhookDeliverer;
use axum::{
    body::Bytes,
    extract::{
        multipart::Multipart, rejection::JsonRejection, ConnectInfo, FromRequest, Path, Query,
        Request, State,
    },
    http::{header, Extensions, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub ingest: IngestService,
    pub limiters: RateLimiters,
    pub subjects: Arc<dyn SubjectResolver>,
    pub webhooks: Arc<WebhookDeliverer>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire the full pipeline from configuration and an endpoint store.
    ///
    /// Starts the notification workers; the returned pool drains once the
    /// state is dropped.
    pub fn build(
        config: Config,
        store: Arc<MemoryStore>,
    ) -> anyhow::Result<(Arc<Self>, NotificationPool)> {
        let metrics = Metrics::new()?;
        let webhooks =
            Arc::new(WebhookDeliverer::from_config(&config.webhook)?.with_metrics(metrics.clone()));

        let notifier = Arc::new(Notifier::new(
            Arc::new(LogMailer),
            SubmissionEmail::new(&config.email, &config.notifications.dashboard_base_url),
            Arc::clone(&webhooks),
        ));
        let (queue, pool) = NotificationQueue::start(
            notifier,
            config.notifications.workers,
            config.notifications.queue_capacity,
        );

        let ingest = IngestService::new(
            store.clone(),
            store,
            Arc::new(SpamScorer::new(config.spam.clone())),
        )
        .with_notifications(Arc::new(queue.with_metrics(metrics.clone())))
        .with_metrics(metrics.clone());

        let state = Self {
            limiters: RateLimiters::new(&config.rate_limit),
            subjects: Arc::new(StaticTokens::from(&config.auth)),
            ingest,
            webhooks,
            metrics,
            config,
        };
        Ok((Arc::new(state), pool))
    }
}

/// Raw peer address recorded by the listener, if served with connect info.
pub fn peer_addr(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
}

/// Rate limiting key for a request: the resolved client IP.
pub fn source_key(req: &Request) -> String {
    client_ip(req.headers(), peer_addr(req.extensions()).as_deref())
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "form-intake",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Whether the body came from a plain HTML form post.
fn is_browser_form(content_type: &str) -> bool {
    content_type.contains("application/x-www-form-urlencoded")
        || content_type.contains("multipart/form-data")
}

/// Split a JSON document into submitted fields and client metadata.
///
/// `{"data": {...}, "meta": {...}}` is the nested form; any other object is
/// taken whole as the fields.
fn split_json(body: &[u8]) -> Result<(FieldMap, FieldMap), IngestError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| IngestError::InvalidBody(e.to_string()))?;
    let Value::Object(mut payload) = payload else {
        return Err(IngestError::InvalidBody("expected a JSON object".to_string()));
    };

    if matches!(payload.get("data"), Some(Value::Object(_))) {
        let data = match payload.remove("data") {
            Some(Value::Object(data)) => data,
            _ => FieldMap::new(),
        };
        let meta = match payload.remove("meta") {
            Some(Value::Object(meta)) => meta,
            _ => FieldMap::new(),
        };
        Ok((data, meta))
    } else {
        Ok((payload, FieldMap::new()))
    }
}

/// Collect form pairs, keeping the first value of a repeated key.
fn first_values(pairs: impl IntoIterator<Item = (String, String)>) -> FieldMap {
    let mut data = FieldMap::new();
    for (key, value) in pairs {
        data.entry(key).or_insert(Value::String(value));
    }
    data
}

async fn read_multipart(mut multipart: Multipart) -> Result<FieldMap, IngestError> {
    let mut pairs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::InvalidForm(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            debug!(%name, "Skipping uploaded file part");
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| IngestError::InvalidForm(e.to_string()))?;
        pairs.push((name, value));
    }
    Ok(first_values(pairs))
}

/// `POST /api/v1/submissions/:public_id`
///
/// Accepts JSON, urlencoded and multipart bodies. Browser form posts are
/// redirected when a target is known; everything else gets the stored
/// record as JSON.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    req: Request,
) -> Result<Response, IngestError> {
    let headers = req.headers().clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let remote_addr = peer_addr(req.extensions());
    let subject = req.extensions().get::<Subject>().map(|s| s.0.clone());
    let redirect_to = Query::<SubmitQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.redirect_to)
        .filter(|s| !s.is_empty());

    let browser_form = is_browser_form(&content_type);
    let (data, client_meta) = if content_type.contains("multipart/form-data") {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| IngestError::InvalidForm(e.body_text()))?;
        (read_multipart(multipart).await?, FieldMap::new())
    } else if content_type.contains("application/x-www-form-urlencoded") {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, &state)
            .await
            .map_err(|e| IngestError::InvalidForm(e.body_text()))?;
        (first_values(pairs), FieldMap::new())
    } else {
        let body = Bytes::from_request(req, &state)
            .await
            .map_err(|e| IngestError::InvalidBody(e.body_text()))?;
        split_json(&body)?
    };

    let outcome = state
        .ingest
        .submit(SubmissionRequest {
            public_id,
            data,
            client_meta,
            headers,
            remote_addr,
            subject,
        })
        .await?;

    if browser_form {
        if let Some(location) = redirect_to.or(outcome.redirect_url) {
            return Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response());
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(SuccessEnvelope::new(outcome.record)),
    )
        .into_response())
}

/// Test webhook request.
#[derive(Debug, Deserialize)]
pub struct TestWebhookRequest {
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Test webhook response.
#[derive(Debug, Serialize)]
pub struct TestWebhookResponse {
    pub delivered: bool,
    pub status: u16,
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// `POST /api/v1/webhooks/test`
///
/// Sends the fixed test payload once, signed when a secret is given.
pub async fn test_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TestWebhookRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorEnvelope::error(e.body_text(), "INVALID_BODY")),
            )
                .into_response()
        }
    };

    if !is_http_url(&request.url) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorEnvelope::error(
                "Webhook URL must be an http or https URL",
                "INVALID_URL",
            )),
        )
            .into_response();
    }

    match state
        .webhooks
        .send_test(&request.url, request.secret.as_deref())
        .await
    {
        Ok(status) => {
            info!(url = %request.url, status, "Test webhook succeeded");
            Json(SuccessEnvelope::new(TestWebhookResponse {
                delivered: true,
                status,
            }))
            .into_response()
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorEnvelope::error(e.to_string(), "WEBHOOK_FAILED")),
        )
            .into_response(),
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router assembly and rate limiting middleware.

use crate::auth::{identify, require_subject};
use crate::error::RateLimited;
use crate::handlers::{self, source_key, AppState};
use crate::limiter::{RateLimitResult, RateLimiter};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

async fn enforce(state: &AppState, limiter: &RateLimiter, req: Request, next: Next) -> Response {
    let source = source_key(&req);
    match limiter.check(&source).await {
        RateLimitResult::Allowed { .. } => next.run(req).await,
        RateLimitResult::Limited { retry_after } => {
            warn!(
                limiter = limiter.name(),
                %source,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limited"
            );
            state.metrics.record_rate_limited(limiter.name());
            RateLimited { retry_after }.into_response()
        }
    }
}

/// Public submission quota, per client IP.
pub async fn limit_public(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    enforce(&state, &state.limiters.public, req, next).await
}

/// Authenticated API quota, per client IP.
pub async fn limit_api(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    enforce(&state, &state.limiters.api, req, next).await
}

/// Build the service router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let submissions = Router::new()
        .route("/api/v1/submissions/:public_id", post(handlers::submit))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_public));

    // Layers run bottom-up: the quota is charged only for known callers.
    let admin = Router::new()
        .route("/api/v1/webhooks/test", post(handlers::test_webhook))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_api))
        .route_layer(middleware::from_fn(require_subject));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .merge(submissions)
        .merge(admin);

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(handlers::metrics));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), identify))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

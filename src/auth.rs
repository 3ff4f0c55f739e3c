// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Caller identity.
//!
//! Sessions are issued elsewhere; this module only maps a bearer token to an
//! opaque subject id. [`identify`] runs on every request and attaches a
//! [`Subject`] when the token is known. Unknown tokens are charged against
//! the auth rate limiter.

use crate::config::AuthConfig;
use crate::error::{IngestError, RateLimited};
use crate::handlers::{source_key, AppState};
use crate::limiter::RateLimitResult;
use crate::policy::PolicyRejection;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject(pub String);

/// Maps session tokens to subject ids.
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<String>;
}

/// Fixed token table from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl From<&AuthConfig> for StaticTokens {
    fn from(config: &AuthConfig) -> Self {
        Self::new(config.tokens.clone())
    }
}

#[async_trait]
impl SubjectResolver for StaticTokens {
    async fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.get(token).filter(|s| !s.is_empty()).cloned()
    }
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Resolve the caller's identity, if any.
pub async fn identify(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(req.headers()) {
        match state.subjects.resolve(&token).await {
            Some(subject) => {
                req.extensions_mut().insert(Subject(subject));
            }
            None => {
                let source = source_key(&req);
                let limiter = &state.limiters.auth;
                if let RateLimitResult::Limited { retry_after } = limiter.check(&source).await {
                    state.metrics.record_rate_limited(limiter.name());
                    return RateLimited { retry_after }.into_response();
                }
                debug!(%source, "Unknown bearer token");
            }
        }
    }
    next.run(req).await
}

/// Refuse requests without a resolved [`Subject`].
pub async fn require_subject(req: Request, next: Next) -> Response {
    if req.extensions().get::<Subject>().is_none() {
        return IngestError::Rejected(PolicyRejection::AuthRequired).into_response();
    }
    next.run(req).await
}

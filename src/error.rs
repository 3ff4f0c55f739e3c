// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Errors visible to submitters and their HTTP mapping.

use crate::policy::PolicyRejection;
use crate::store::StoreError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Submission pipeline errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Form not found")]
    NotFound,

    #[error("Form is not accepting submissions")]
    Inactive,

    #[error(transparent)]
    Rejected(#[from] PolicyRejection),

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("Invalid form data: {0}")]
    InvalidForm(String),

    #[error("Failed to save submission")]
    Storage(#[from] StoreError),
}

impl IngestError {
    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Inactive => "FORM_INACTIVE",
            Self::Rejected(PolicyRejection::InvalidKey) => "INVALID_KEY",
            Self::Rejected(PolicyRejection::AuthRequired) => "AUTH_REQUIRED",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::InvalidForm(_) => "INVALID_FORM",
            Self::Storage(_) => "SUBMISSION_FAILED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Inactive | Self::InvalidBody(_) | Self::InvalidForm(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(PolicyRejection::InvalidKey) => StatusCode::FORBIDDEN,
            Self::Rejected(PolicyRejection::AuthRequired) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{status: "success", data}`
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// `{status: "error" | "fail", message, code}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub message: String,
    pub code: &'static str,
}

impl ErrorEnvelope {
    pub fn error(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: "error",
            message: message.into(),
            code,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        // Storage details stay in the log.
        if let Self::Storage(e) = &self {
            error!(error = %e, "Submission storage failed");
        }
        (
            self.status(),
            Json(ErrorEnvelope::error(self.to_string(), self.code())),
        )
            .into_response()
    }
}

/// 429 with `Retry-After` in whole seconds, rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

impl RateLimited {
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let retry_secs = self.retry_after_secs();
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_secs.to_string())],
            Json(ErrorEnvelope {
                status: "fail",
                message: format!("Too many requests, retry in {retry_secs}s"),
                code: "RATE_LIMITED",
            }),
        )
            .into_response()
    }
}

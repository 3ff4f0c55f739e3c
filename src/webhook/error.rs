// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Webhook delivery errors.

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Errors raised while delivering one webhook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection could not be established or was dropped.
    #[error("network connection failed: {message}")]
    Network { message: String },

    /// No response within the per-request timeout.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    /// Receiver answered with a non-2xx status.
    #[error("unexpected status {status_code}")]
    UnexpectedStatus { status_code: u16 },

    /// Payload could not be serialized.
    #[error("failed to serialize payload: {message}")]
    Serialization { message: String },

    /// Target URL or secret is unusable.
    #[error("invalid webhook configuration: {message}")]
    Configuration { message: String },

    /// Every attempt failed; carries the last failure.
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<DeliveryError>,
    },
}

impl DeliveryError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    pub fn status(status_code: u16) -> Self {
        Self::UnexpectedStatus { status_code }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn retries_exhausted(attempts: u32, last_error: DeliveryError) -> Self {
        Self::RetriesExhausted {
            attempts,
            last_error: Box::new(last_error),
        }
    }

    /// Label used for attempt metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::UnexpectedStatus { .. } => "status",
            Self::Serialization { .. } => "serialization",
            Self::Configuration { .. } => "configuration",
            Self::RetriesExhausted { .. } => "exhausted",
        }
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Endpoint policies and submission records.

use crate::metadata::ServerMetadata;
use crate::spam::SpamScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Submitted fields: string keys to arbitrary JSON values.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

const MAX_NAME_LEN: usize = 100;

/// Endpoint configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Unknown access mode: {0}")]
    UnknownAccessMode(String),

    #[error("Endpoint {0}: name is required")]
    NameRequired(String),

    #[error("Endpoint {0}: name must be less than {MAX_NAME_LEN} characters")]
    NameTooLong(String),

    #[error("Endpoint {0}: keyed access requires a submission key")]
    MissingSubmissionKey(String),

    #[error("Endpoint {endpoint}: invalid webhook URL {url}")]
    InvalidWebhookUrl { endpoint: String, url: String },
}

/// Who may submit to an endpoint.
///
/// The legacy names `public`, `with_key` and `private` are accepted on input.
/// Anything else is rejected rather than treated as open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Anyone may submit
    #[default]
    #[serde(alias = "public")]
    Open,
    /// The submission must carry the endpoint's shared secret
    #[serde(alias = "with_key")]
    Keyed,
    /// The submitter must hold a valid session
    #[serde(alias = "private")]
    Authenticated,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Keyed => "keyed",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" | "public" => Ok(Self::Open),
            "keyed" | "with_key" => Ok(Self::Keyed),
            "authenticated" | "private" => Ok(Self::Authenticated),
            other => Err(EndpointError::UnknownAccessMode(other.to_string())),
        }
    }
}

/// Whether an endpoint currently accepts submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    #[default]
    Active,
    Inactive,
}

/// A registered submission endpoint and its access policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    /// Internal identifier
    pub id: String,
    /// Identifier used in submission URLs
    pub public_id: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub status: EndpointStatus,
    #[serde(default)]
    pub access_mode: AccessMode,
    /// Shared secret for keyed access
    #[serde(default, skip_serializing)]
    pub submission_key: Option<String>,
    /// Where browser form posts are sent after success
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// HMAC key for webhook signatures
    #[serde(default, skip_serializing)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl EndpointPolicy {
    /// A minimal active open endpoint.
    pub fn open(id: impl Into<String>, public_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_id: public_id.into(),
            name: name.into(),
            status: EndpointStatus::Active,
            access_mode: AccessMode::Open,
            submission_key: None,
            redirect_url: None,
            webhook_url: None,
            webhook_secret: None,
            notify_emails: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EndpointStatus::Active
    }

    pub fn submission_key(&self) -> Option<&str> {
        self.submission_key.as_deref().filter(|s| !s.is_empty())
    }

    pub fn redirect_url(&self) -> Option<&str> {
        non_empty(&self.redirect_url)
    }

    pub fn webhook_url(&self) -> Option<&str> {
        non_empty(&self.webhook_url)
    }

    /// Signing secret, only when non-empty.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Check the invariants an endpoint must hold before it is served.
    pub fn validate(&self) -> Result<(), EndpointError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(EndpointError::NameRequired(self.public_id.clone()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(EndpointError::NameTooLong(self.public_id.clone()));
        }

        if self.access_mode == AccessMode::Keyed && self.submission_key().is_none() {
            return Err(EndpointError::MissingSubmissionKey(self.public_id.clone()));
        }

        if let Some(url) = self.webhook_url() {
            let valid = Url::parse(url)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
                .unwrap_or(false);
            if !valid {
                return Err(EndpointError::InvalidWebhookUrl {
                    endpoint: self.public_id.clone(),
                    url: url.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Read state of a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Unread,
    Read,
}

/// Metadata stored with a submission, in three trust namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    /// Observed by the server; trusted
    #[serde(rename = "_server")]
    pub server: ServerMetadata,
    /// Declared by the submitter; may be forged
    #[serde(rename = "_client")]
    pub client: FieldMap,
    /// Spam analysis result
    #[serde(rename = "_spam")]
    pub spam: SpamScore,
}

/// One persisted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    /// Owning endpoint's internal identifier
    #[serde(rename = "form_id")]
    pub endpoint_id: String,
    pub status: SubmissionStatus,
    pub data: FieldMap,
    pub meta: SubmissionMeta,
    pub created_at: DateTime<Utc>,
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Webhook payload body.

use crate::models::{EndpointPolicy, FieldMap, SubmissionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event sent for every stored submission.
pub const EVENT_SUBMISSION_CREATED: &str = "submission.created";

/// Event sent by the administrator test route.
pub const EVENT_TEST: &str = "test";

/// JSON body of a webhook delivery.
///
/// `form_id` is the endpoint's public id, never its internal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub form_id: String,
    pub form_name: String,
    pub submission_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: FieldMap,
}

impl WebhookPayload {
    /// Payload announcing a stored submission.
    pub fn submission_created(endpoint: &EndpointPolicy, record: &SubmissionRecord) -> Self {
        Self {
            event: EVENT_SUBMISSION_CREATED.to_string(),
            form_id: endpoint.public_id.clone(),
            form_name: endpoint.name.clone(),
            submission_id: record.id.to_string(),
            timestamp: record.created_at,
            data: record.data.clone(),
        }
    }

    /// Fixed payload for validating a URL and secret pair.
    pub fn test() -> Self {
        let mut data = FieldMap::new();
        data.insert(
            "message".to_string(),
            Value::String("This is a test webhook from Form Intake".to_string()),
        );

        Self {
            event: EVENT_TEST.to_string(),
            form_id: "test-form-id".to_string(),
            form_name: "Test Form".to_string(),
            submission_id: "test-submission-id".to_string(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Canonical request body. Serialized once per delivery.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

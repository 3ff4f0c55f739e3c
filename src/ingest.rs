// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission ingest.
//!
//! [`IngestService::submit`] runs the admission pipeline for one request,
//! failing fast and never retrying:
//!
//! 1. resolve the endpoint by public id
//! 2. refuse inactive endpoints
//! 3. evaluate the access policy
//! 4. collect server metadata
//! 5. score for spam
//! 6. write the record
//! 7. bump the endpoint counter, best effort
//! 8. enqueue notifications without waiting for them
//!
//! Nothing is written unless steps 1-3 pass, and the record is complete
//! before the single write in step 6.

use crate::error::IngestError;
use crate::metadata::ServerMetadata;
use crate::metrics::Metrics;
use crate::models::{FieldMap, SubmissionMeta, SubmissionRecord, SubmissionStatus};
use crate::notify::{NotificationJob, NotificationSink};
use crate::policy;
use crate::spam::SpamScorer;
use crate::store::{EndpointDirectory, SubmissionStore};
use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Client-declared metadata key holding the form fill time in milliseconds.
pub const FILL_TIME_KEY: &str = "fill_time_ms";

/// One inbound submission, already decoded from its transport encoding.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub public_id: String,
    pub data: FieldMap,
    /// Submitter-declared metadata; stored but never trusted
    pub client_meta: FieldMap,
    pub headers: HeaderMap,
    /// Raw peer address, `host:port`
    pub remote_addr: Option<String>,
    /// Identity resolved from the caller's session, if any
    pub subject: Option<String>,
}

/// A stored submission and where the submitter should be sent next.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub record: SubmissionRecord,
    /// The endpoint's configured redirect, if any
    pub redirect_url: Option<String>,
}

/// The admission pipeline.
pub struct IngestService {
    directory: Arc<dyn EndpointDirectory>,
    submissions: Arc<dyn SubmissionStore>,
    scorer: Arc<SpamScorer>,
    notifications: Option<Arc<dyn NotificationSink>>,
    metrics: Option<Metrics>,
}

impl IngestService {
    pub fn new(
        directory: Arc<dyn EndpointDirectory>,
        submissions: Arc<dyn SubmissionStore>,
        scorer: Arc<SpamScorer>,
    ) -> Self {
        Self {
            directory,
            submissions,
            scorer,
            notifications: None,
            metrics: None,
        }
    }

    /// Register where stored submissions are handed for notification.
    pub fn with_notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn scorer(&self) -> &Arc<SpamScorer> {
        &self.scorer
    }

    /// Admit, score and store one submission.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome, IngestError> {
        let result = self.run(request).await;
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(outcome) => {
                    metrics.record_submission("stored");
                    if outcome.record.meta.spam.is_spam {
                        metrics.record_spam();
                    }
                }
                Err(e) => metrics.record_submission(&e.code().to_ascii_lowercase()),
            }
        }
        result
    }

    async fn run(&self, request: SubmissionRequest) -> Result<SubmissionOutcome, IngestError> {
        let SubmissionRequest {
            public_id,
            mut data,
            mut client_meta,
            headers,
            remote_addr,
            subject,
        } = request;

        let endpoint = self
            .directory
            .lookup_by_public_id(&public_id)
            .await?
            .ok_or(IngestError::NotFound)?;

        if !endpoint.is_active() {
            debug!(%public_id, "Submission to inactive endpoint");
            return Err(IngestError::Inactive);
        }

        if let Err(rejection) =
            policy::evaluate(&endpoint, &mut data, &mut client_meta, subject.as_deref())
        {
            warn!(
                %public_id,
                access_mode = %endpoint.access_mode,
                reason = %rejection,
                "Submission rejected by access policy"
            );
            return Err(rejection.into());
        }

        let server = ServerMetadata::collect(&headers, remote_addr.as_deref());
        let spam = self
            .scorer
            .evaluate(&server.ip, &server.user_agent, &data, fill_time(&client_meta))
            .await;

        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id.clone(),
            status: SubmissionStatus::Unread,
            data,
            meta: SubmissionMeta {
                server,
                client: client_meta,
                spam,
            },
            created_at: Utc::now(),
        };

        self.submissions.insert(&record).await?;

        if let Err(e) = self.directory.increment_submission_count(&endpoint.id).await {
            warn!(endpoint_id = %endpoint.id, error = %e, "Failed to increment submission count");
        }

        info!(
            submission_id = %record.id,
            %public_id,
            ip = %record.meta.server.ip,
            spam_score = record.meta.spam.score,
            is_spam = record.meta.spam.is_spam,
            "Submission stored"
        );

        let redirect_url = endpoint.redirect_url().map(str::to_string);
        if let Some(sink) = &self.notifications {
            let job = NotificationJob {
                endpoint,
                record: record.clone(),
            };
            if let Err(e) = sink.enqueue(job) {
                warn!(submission_id = %record.id, error = %e, "Notification not queued");
            }
        }

        Ok(SubmissionOutcome {
            record,
            redirect_url,
        })
    }
}

/// Fill time declared by the client, as a non-negative number of
/// milliseconds or a string holding one.
fn fill_time(client_meta: &FieldMap) -> Option<Duration> {
    let millis = match client_meta.get(FILL_TIME_KEY)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !millis.is_finite() || millis < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(millis / 1000.0).ok()
}

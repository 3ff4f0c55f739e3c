// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Notification dispatch.
//!
//! Stored submissions are handed to a bounded queue served by a fixed pool
//! of workers. Enqueueing never waits: when the queue is full the job is
//! dropped and counted. Each job runs two independent fan-outs, email to the
//! endpoint's recipients and the endpoint's webhook, and failures in either
//! are logged and go no further.

use crate::email::{EmailSender, SubmissionEmail};
use crate::metrics::Metrics;
use crate::models::{EndpointPolicy, SubmissionRecord};
use crate::webhook::{WebhookDeliverer, WebhookPayload, WebhookTarget};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Dispatch errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification queue is full")]
    QueueFull,

    #[error("notification queue is closed")]
    Closed,
}

/// Work for one stored submission.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub endpoint: EndpointPolicy,
    pub record: SubmissionRecord,
}

/// Accepts jobs without blocking the caller.
pub trait NotificationSink: Send + Sync {
    fn enqueue(&self, job: NotificationJob) -> Result<(), NotifyError>;
}

/// Runs the email and webhook fan-outs for one job.
pub struct Notifier {
    mailer: Arc<dyn EmailSender>,
    renderer: SubmissionEmail,
    webhooks: Arc<WebhookDeliverer>,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn EmailSender>,
        renderer: SubmissionEmail,
        webhooks: Arc<WebhookDeliverer>,
    ) -> Self {
        Self {
            mailer,
            renderer,
            webhooks,
        }
    }

    pub async fn notify(&self, job: &NotificationJob) {
        let NotificationJob { endpoint, record } = job;

        if !endpoint.notify_emails.is_empty() {
            let message = self.renderer.render(endpoint, &record.data);
            match self.mailer.send(&message).await {
                Ok(()) => debug!(submission_id = %record.id, "Email notification sent"),
                Err(e) => warn!(
                    submission_id = %record.id,
                    error = %e,
                    "Email notification failed"
                ),
            }
        }

        if let Some(target) = WebhookTarget::for_endpoint(endpoint) {
            let payload = WebhookPayload::submission_created(endpoint, record);
            // Outcome is logged and counted by the deliverer.
            let _ = self.webhooks.deliver(&target, &payload).await;
        }
    }
}

/// Producer side of the worker pool.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<NotificationJob>,
    metrics: Option<Metrics>,
}

/// Worker handles. Workers exit once every [`NotificationQueue`] is dropped
/// and the remaining jobs are drained.
pub struct NotificationPool {
    handles: Vec<JoinHandle<()>>,
}

impl NotificationQueue {
    /// Spawn `workers` workers sharing a queue of `capacity` jobs.
    pub fn start(
        notifier: Arc<Notifier>,
        workers: usize,
        capacity: usize,
    ) -> (Self, NotificationPool) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let notifier = Arc::clone(&notifier);
                tokio::spawn(async move {
                    debug!(worker_id, "Notification worker starting");
                    loop {
                        let job = receiver.lock().await.recv().await;
                        match job {
                            Some(job) => notifier.notify(&job).await,
                            None => break,
                        }
                    }
                    debug!(worker_id, "Notification worker stopped");
                })
            })
            .collect();

        info!(workers, capacity, "Notification pool started");
        (
            Self {
                sender,
                metrics: None,
            },
            NotificationPool { handles },
        )
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl NotificationSink for NotificationQueue {
    fn enqueue(&self, job: NotificationJob) -> Result<(), NotifyError> {
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    submission_id = %job.record.id,
                    "Notification queue full, dropping job"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification_dropped();
                }
                Err(NotifyError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotifyError::Closed),
        }
    }
}

impl NotificationPool {
    /// Wait for the workers to drain the queue, up to `timeout`.
    pub async fn join(self, timeout: Duration) {
        let workers = self.handles.len();
        let all = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Notification worker panicked");
                }
            }
        };
        match tokio::time::timeout(timeout, all).await {
            Ok(()) => info!(workers, "Notification pool drained"),
            Err(_) => warn!(
                timeout_secs = timeout.as_secs(),
                "Notification pool did not drain in time"
            ),
        }
    }
}

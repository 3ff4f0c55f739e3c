// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the intake pipeline.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters owned by the application state. Cloning shares the underlying series.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    spam_flagged: IntCounter,
    rate_limited: IntCounterVec,
    webhook_attempts: IntCounterVec,
    webhook_deliveries: IntCounterVec,
    notifications_dropped: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("intake_submissions_total", "Submissions by outcome"),
            &["outcome"],
        )?;
        let spam_flagged = IntCounter::new(
            "intake_spam_flagged_total",
            "Stored submissions whose spam score reached the threshold",
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("intake_rate_limited_total", "Requests rejected by a rate limiter"),
            &["limiter"],
        )?;
        let webhook_attempts = IntCounterVec::new(
            Opts::new("intake_webhook_attempts_total", "Webhook HTTP attempts by result"),
            &["result"],
        )?;
        let webhook_deliveries = IntCounterVec::new(
            Opts::new("intake_webhook_deliveries_total", "Webhook deliveries by final outcome"),
            &["outcome"],
        )?;
        let notifications_dropped = IntCounter::new(
            "intake_notifications_dropped_total",
            "Notification jobs dropped because the queue was full",
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(spam_flagged.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(webhook_attempts.clone()))?;
        registry.register(Box::new(webhook_deliveries.clone()))?;
        registry.register(Box::new(notifications_dropped.clone()))?;

        Ok(Self {
            registry,
            submissions,
            spam_flagged,
            rate_limited,
            webhook_attempts,
            webhook_deliveries,
            notifications_dropped,
        })
    }

    /// `outcome` is `stored` or a lowercase error code.
    pub fn record_submission(&self, outcome: &str) {
        self.submissions.with_label_values(&[outcome]).inc();
    }

    pub fn record_spam(&self) {
        self.spam_flagged.inc();
    }

    pub fn record_rate_limited(&self, limiter: &str) {
        self.rate_limited.with_label_values(&[limiter]).inc();
    }

    /// `result` is `success` or a delivery error kind.
    pub fn record_webhook_attempt(&self, result: &str) {
        self.webhook_attempts.with_label_values(&[result]).inc();
    }

    /// `outcome` is `delivered` or `failed`.
    pub fn record_webhook_delivery(&self, outcome: &str) {
        self.webhook_deliveries.with_label_values(&[outcome]).inc();
    }

    pub fn record_notification_dropped(&self) {
        self.notifications_dropped.inc();
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

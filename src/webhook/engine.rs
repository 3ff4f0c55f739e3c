// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Webhook delivery engine.
//!
//! A delivery serializes its payload once and then makes up to
//! `max_attempts` POSTs of exactly those bytes. Each attempt gets a fresh
//! timestamp header and, when the endpoint has a secret, a signature over
//! the body. Every attempt of one delivery carries the same
//! `X-Webhook-Delivery` id so receivers can discard duplicates.

use super::client::{HttpTransport, WebhookRequest, WebhookTransport};
use super::error::{DeliveryError, Result};
use super::payload::{WebhookPayload, EVENT_SUBMISSION_CREATED};
use super::retry::RetryPolicy;
use super::signature;
use super::{
    HEADER_CONTENT_TYPE, HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    HEADER_USER_AGENT,
};
use crate::config::WebhookConfig;
use crate::metrics::Metrics;
use crate::models::EndpointPolicy;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Destination of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    /// Signing secret; unsigned when `None`
    pub secret: Option<String>,
}

impl WebhookTarget {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            url: url.into(),
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// The endpoint's webhook, if one is configured.
    pub fn for_endpoint(endpoint: &EndpointPolicy) -> Option<Self> {
        endpoint
            .webhook_url()
            .map(|url| Self::new(url, endpoint.webhook_secret().map(str::to_string)))
    }
}

/// Successful delivery summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivery_id: Uuid,
    /// Attempt that succeeded (1-based)
    pub attempts: u32,
    pub status: u16,
}

/// Signs and sends webhook payloads with retries.
pub struct WebhookDeliverer {
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
    user_agent: String,
    metrics: Option<Metrics>,
}

impl WebhookDeliverer {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        policy: RetryPolicy,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            policy,
            user_agent: user_agent.into(),
            metrics: None,
        }
    }

    /// Deliverer backed by [`HttpTransport`].
    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::new(
            Arc::new(transport),
            RetryPolicy::from(config),
            config.user_agent.clone(),
        ))
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Build one attempt's request around an already serialized body.
    ///
    /// The event header is always `submission.created`; test pings differ
    /// only in the body's `event` field.
    pub fn build_request(
        &self,
        target: &WebhookTarget,
        body: &[u8],
        delivery_id: Uuid,
    ) -> Result<WebhookRequest> {
        let mut headers = vec![
            (HEADER_CONTENT_TYPE, "application/json".to_string()),
            (HEADER_USER_AGENT, self.user_agent.clone()),
            (HEADER_EVENT, EVENT_SUBMISSION_CREATED.to_string()),
            (
                HEADER_TIMESTAMP,
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (HEADER_DELIVERY, delivery_id.to_string()),
        ];
        if let Some(secret) = target.secret.as_deref() {
            headers.push((HEADER_SIGNATURE, signature::sign(body, secret)?));
        }

        Ok(WebhookRequest {
            url: target.url.clone(),
            headers,
            body: body.to_vec(),
        })
    }

    async fn attempt(
        &self,
        target: &WebhookTarget,
        body: &[u8],
        delivery_id: Uuid,
        attempt: u32,
    ) -> Result<u16> {
        let request = self.build_request(target, body, delivery_id)?;
        let outcome = match self.transport.send(&request).await {
            Ok(status) if (200..300).contains(&status) => Ok(status),
            Ok(status) => Err(DeliveryError::status(status)),
            Err(e) => Err(e),
        };

        if let Some(metrics) = &self.metrics {
            match &outcome {
                Ok(_) => metrics.record_webhook_attempt("success"),
                Err(e) => metrics.record_webhook_attempt(e.kind()),
            }
        }
        if let Err(e) = &outcome {
            warn!(url = %target.url, %delivery_id, attempt, error = %e, "Webhook attempt failed");
        }
        outcome
    }

    /// Deliver `payload` to `target`, retrying per the policy.
    ///
    /// The error is for logging only; callers never surface it to submitters.
    pub async fn deliver(
        &self,
        target: &WebhookTarget,
        payload: &WebhookPayload,
    ) -> Result<DeliveryReport> {
        let body = payload.to_body()?;
        let delivery_id = Uuid::new_v4();
        let body = body.as_slice();

        let result = self
            .policy
            .execute(move |attempt| self.attempt(target, body, delivery_id, attempt))
            .await;

        match result {
            Ok((status, attempts)) => {
                info!(url = %target.url, %delivery_id, attempts, status, "Webhook delivered");
                if let Some(metrics) = &self.metrics {
                    metrics.record_webhook_delivery("delivered");
                }
                Ok(DeliveryReport {
                    delivery_id,
                    attempts,
                    status,
                })
            }
            Err(exhausted) => {
                error!(
                    url = %target.url,
                    %delivery_id,
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Webhook delivery failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_webhook_delivery("failed");
                }
                Err(DeliveryError::retries_exhausted(
                    exhausted.attempts,
                    exhausted.last_error,
                ))
            }
        }
    }

    /// Send the fixed test payload once, without retries.
    ///
    /// Returns the receiver's status when it is 2xx.
    pub async fn send_test(&self, url: &str, secret: Option<&str>) -> Result<u16> {
        let target = WebhookTarget::new(url, secret.map(str::to_string));
        let payload = WebhookPayload::test();
        let body = payload.to_body()?;
        let status = self
            .attempt(&target, &body, Uuid::new_v4(), 1)
            .await?;
        info!(url = %target.url, status, "Test webhook delivered");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays scripted outcomes and records what was sent.
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<u16>>>,
        sent: Mutex<Vec<(Duration, WebhookRequest)>>,
        started: Instant,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<u16>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                sent: Mutex::new(Vec::new()),
                started: Instant::now(),
            })
        }

        fn sent(&self) -> Vec<(Duration, WebhookRequest)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn send(&self, request: &WebhookRequest) -> Result<u16> {
            self.sent
                .lock()
                .unwrap()
                .push((self.started.elapsed(), request.clone()));
            self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(200))
        }
    }

    fn deliverer(transport: Arc<ScriptedTransport>) -> WebhookDeliverer {
        WebhookDeliverer::new(transport, RetryPolicy::default(), "FormIntake-Webhook/test")
    }

    fn signed_target() -> WebhookTarget {
        WebhookTarget::new("http://receiver.test/hook", Some("whsec".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_failure_makes_three_attempts_with_backoff() {
        let transport = ScriptedTransport::new(vec![
            Ok(500),
            Err(DeliveryError::network("connection reset")),
            Ok(503),
        ]);
        let engine = deliverer(Arc::clone(&transport));

        let error = engine
            .deliver(&signed_target(), &WebhookPayload::test())
            .await
            .unwrap_err();
        assert_eq!(
            error,
            DeliveryError::retries_exhausted(3, DeliveryError::status(503))
        );

        let sent = transport.sent();
        let offsets: Vec<u64> = sent.iter().map(|(t, _)| t.as_secs()).collect();
        assert_eq!(offsets, vec![0, 1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_2xx() {
        let transport = ScriptedTransport::new(vec![Ok(502), Ok(202)]);
        let engine = deliverer(Arc::clone(&transport));

        let report = engine
            .deliver(&signed_target(), &WebhookPayload::test())
            .await
            .unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(report.status, 202);
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_resend_identical_body_and_delivery_id() {
        let transport = ScriptedTransport::new(vec![Ok(500), Ok(500), Ok(200)]);
        let engine = deliverer(Arc::clone(&transport));
        let report = engine
            .deliver(&signed_target(), &WebhookPayload::test())
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        let first = &sent[0].1;
        for (_, request) in &sent[1..] {
            assert_eq!(request.body, first.body);
            assert_eq!(request.header(HEADER_SIGNATURE), first.header(HEADER_SIGNATURE));
            assert_eq!(request.header(HEADER_DELIVERY), first.header(HEADER_DELIVERY));
        }
        assert_eq!(
            first.header(HEADER_DELIVERY),
            Some(report.delivery_id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn headers_and_signature() {
        let transport = ScriptedTransport::new(vec![Ok(200)]);
        let engine = deliverer(Arc::clone(&transport));
        let payload = WebhookPayload::test();
        engine.deliver(&signed_target(), &payload).await.unwrap();

        let (_, request) = transport.sent().remove(0);
        assert_eq!(request.url, "http://receiver.test/hook");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("user-agent"), Some("FormIntake-Webhook/test"));
        assert_eq!(
            request.header("x-webhook-event"),
            Some(EVENT_SUBMISSION_CREATED)
        );
        assert!(request.header("x-webhook-timestamp").is_some());

        let expected = signature::sign(&request.body, "whsec").unwrap();
        assert_eq!(request.header("x-webhook-signature"), Some(expected.as_str()));
        assert_eq!(request.body, payload.to_body().unwrap());
    }

    #[tokio::test]
    async fn unsigned_without_secret() {
        let transport = ScriptedTransport::new(vec![Ok(200)]);
        let engine = deliverer(Arc::clone(&transport));
        let target = WebhookTarget::new("http://receiver.test/hook", Some(String::new()));
        engine.deliver(&target, &WebhookPayload::test()).await.unwrap();

        let (_, request) = transport.sent().remove(0);
        assert_eq!(request.header(HEADER_SIGNATURE), None);
    }

    #[tokio::test]
    async fn test_send_is_single_shot() {
        let transport = ScriptedTransport::new(vec![Ok(500), Ok(200)]);
        let engine = deliverer(Arc::clone(&transport));

        let error = engine
            .send_test("http://receiver.test/hook", None)
            .await
            .unwrap_err();
        assert_eq!(error, DeliveryError::status(500));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_keeps_created_event_header() {
        let transport = ScriptedTransport::new(vec![Ok(200)]);
        let engine = deliverer(Arc::clone(&transport));
        engine
            .send_test("http://receiver.test/hook", Some("whsec"))
            .await
            .unwrap();

        let (_, request) = transport.sent().remove(0);
        assert_eq!(request.header(HEADER_EVENT), Some(EVENT_SUBMISSION_CREATED));
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["event"], crate::webhook::EVENT_TEST);
    }

    #[tokio::test]
    async fn attempts_are_counted() {
        let metrics = Metrics::new().unwrap();
        let transport = ScriptedTransport::new(vec![Ok(200)]);
        let engine = deliverer(transport).with_metrics(metrics.clone());
        engine
            .deliver(&signed_target(), &WebhookPayload::test())
            .await
            .unwrap();

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"intake_webhook_attempts_total{result="success"} 1"#));
        assert!(text.contains(r#"intake_webhook_deliveries_total{outcome="delivered"} 1"#));
    }

    #[test]
    fn target_from_endpoint() {
        let mut endpoint = EndpointPolicy::open("1", "p", "Contact");
        assert_eq!(WebhookTarget::for_endpoint(&endpoint), None);

        endpoint.webhook_url = Some("https://hooks.example.com".to_string());
        endpoint.webhook_secret = Some("s".to_string());
        assert_eq!(
            WebhookTarget::for_endpoint(&endpoint),
            Some(WebhookTarget::new("https://hooks.example.com", Some("s".to_string())))
        );
    }
}

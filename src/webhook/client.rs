// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP transport for webhook delivery.
//!
//! The engine talks to a [`WebhookTransport`] so retry and signing logic can
//! be exercised without a network. [`HttpTransport`] is the reqwest-backed
//! implementation with a fixed per-request timeout.

use super::error::{DeliveryError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// One fully built POST request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    pub url: String,
    /// Header name and value pairs, sent in order.
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends webhook requests and reports the receiver's status code.
///
/// Transport failures map to [`DeliveryError`]; any HTTP response, whatever
/// its status, is `Ok`.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<u16>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn send(&self, request: &WebhookRequest) -> Result<u16> {
        let mut http_request = self.client.post(&request.url).body(request.body.clone());
        for (name, value) in &request.headers {
            http_request = http_request.header(*name, value);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::timeout(self.timeout.as_secs())
            } else if e.is_builder() {
                DeliveryError::configuration(e.to_string())
            } else {
                DeliveryError::network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        // Drain the body so the connection can be reused.
        let _ = response.bytes().await;
        debug!(url = %request.url, status, "Received webhook response");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = WebhookRequest {
            url: "http://localhost/hook".to_string(),
            headers: vec![("X-Webhook-Event", "test".to_string())],
            body: Vec::new(),
        };
        assert_eq!(request.header("x-webhook-event"), Some("test"));
        assert_eq!(request.header("X-Webhook-Signature"), None);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let request = WebhookRequest {
            // Port 9 (discard) on loopback is closed in test environments.
            url: "http://127.0.0.1:9/hook".to_string(),
            headers: Vec::new(),
            body: b"{}".to_vec(),
        };
        let error = transport.send(&request).await.unwrap_err();
        assert!(matches!(
            error,
            DeliveryError::Network { .. } | DeliveryError::Timeout { .. }
        ));
    }
}

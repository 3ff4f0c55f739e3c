// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signed webhook delivery.
//!
//! Wire contract: `POST` with a JSON [`WebhookPayload`] body and the headers
//! below. `X-Webhook-Signature` is present only when the endpoint has a
//! signing secret.

pub mod client;
pub mod engine;
pub mod error;
pub mod payload;
pub mod retry;
pub mod signature;

pub use client::{HttpTransport, WebhookRequest, WebhookTransport};
pub use engine::{DeliveryReport, WebhookDeliverer, WebhookTarget};
pub use error::DeliveryError;
pub use payload::{WebhookPayload, EVENT_SUBMISSION_CREATED, EVENT_TEST};
pub use retry::RetryPolicy;

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_EVENT: &str = "X-Webhook-Event";
/// RFC 3339, regenerated per attempt
pub const HEADER_TIMESTAMP: &str = "X-Webhook-Timestamp";
/// `sha256=<hex>`
pub const HEADER_SIGNATURE: &str = "X-Webhook-Signature";
/// UUID shared by every attempt of one delivery
pub const HEADER_DELIVERY: &str = "X-Webhook-Delivery";

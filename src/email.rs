// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Email notification boundary.
//!
//! Mail transport is an external collaborator behind [`EmailSender`]. The
//! crate ships [`LogMailer`], which writes the rendered message to the log
//! instead of sending it.

use crate::config::EmailConfig;
use crate::models::{EndpointPolicy, FieldMap};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write;
use thiserror::Error;
use tracing::info;

/// Email delivery errors.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("No recipients")]
    NoRecipients,

    #[error("Mail transport failed: {0}")]
    Transport(String),
}

/// A rendered plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// `Name <address>` or just the address
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Sends rendered messages.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Renders submission notifications.
#[derive(Debug, Clone)]
pub struct SubmissionEmail {
    from: String,
    dashboard_base_url: String,
}

impl SubmissionEmail {
    pub fn new(config: &EmailConfig, dashboard_base_url: &str) -> Self {
        let from = match (config.from_name.trim(), config.from.trim()) {
            (_, "") => String::new(),
            ("", address) => address.to_string(),
            (name, address) => format!("{name} <{address}>"),
        };
        Self {
            from,
            dashboard_base_url: dashboard_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn subject(endpoint: &EndpointPolicy) -> String {
        format!("New submission: {}", endpoint.name)
    }

    /// Fields in key order, one per line, then the dashboard link.
    pub fn text(&self, endpoint: &EndpointPolicy, data: &FieldMap) -> String {
        let mut body = format!("New submission received for {}\n\n", endpoint.name);
        for (key, value) in data {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(body, "{key}: {rendered}");
        }
        let _ = write!(
            body,
            "\nView in dashboard: {}/forms/{}\n",
            self.dashboard_base_url, endpoint.public_id
        );
        body
    }

    pub fn render(&self, endpoint: &EndpointPolicy, data: &FieldMap) -> EmailMessage {
        EmailMessage {
            from: self.from.clone(),
            to: endpoint.notify_emails.clone(),
            subject: Self::subject(endpoint),
            text: self.text(endpoint, data),
        }
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if message.to.is_empty() {
            return Err(EmailError::NoRecipients);
        }
        info!(
            to = ?message.to,
            subject = %message.subject,
            body = %message.text,
            "Email notification (not sent, logging mailer)"
        );
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the form intake service.
//!
//! Values come from an optional `form-intake.toml` next to the binary and
//! from `INTAKE__*` environment variables (nested keys separated by `__`,
//! e.g. `INTAKE__SPAM__SCORE_THRESHOLD=60`). A `.env` file is honoured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the form intake service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Per-concern rate limiter quotas
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Spam scoring configuration
    #[serde(default)]
    pub spam: SpamConfig,

    /// Webhook delivery configuration
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Notification worker pool configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Email notification configuration
    #[serde(default)]
    pub email: EmailConfig,

    /// Bearer tokens accepted for authenticated submissions and admin routes
    #[serde(default)]
    pub auth: AuthConfig,

    /// JSON file holding the endpoint policies to serve
    #[serde(default)]
    pub endpoints_file: Option<String>,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Longest accepted quota window: one day.
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// One token bucket quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Admissions granted per window
    pub burst: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Quota {
    pub const fn per_minute(burst: u32) -> Self {
        Self {
            burst,
            window_secs: 60,
        }
    }

    /// Get the window duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate limiting configuration, one quota per traffic class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Public submission traffic (default: 100 per minute)
    #[serde(default = "default_public_quota")]
    pub public: Quota,

    /// Authentication traffic (default: 10 per minute)
    #[serde(default = "default_auth_quota")]
    pub auth: Quota,

    /// General API traffic (default: 200 per minute)
    #[serde(default = "default_api_quota")]
    pub api: Quota,

    /// Interval between idle visitor sweeps in seconds (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Spam scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    /// Score at which a submission is flagged (default: 50)
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u8,

    /// Submissions per source per window before `rate_limited` fires (default: 10)
    #[serde(default = "default_spam_burst")]
    pub burst: u32,

    /// Submission tracking window in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Hidden fields that humans leave empty
    #[serde(default = "default_honeypot_fields")]
    pub honeypot_fields: Vec<String>,

    /// Fill times below this many milliseconds count as automated (default: 2000)
    #[serde(default = "default_min_fill_time_ms")]
    pub min_fill_time_ms: u64,
}

/// Webhook delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Total delivery attempts including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds, doubled per retry (default: 1000)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent with every delivery
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Notification worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Concurrent delivery workers (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Jobs that may wait for a worker before new ones are dropped (default: 1024)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Base URL used for dashboard links in emails
    #[serde(default = "default_dashboard_base_url")]
    pub dashboard_base_url: String,
}

/// Email notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address
    #[serde(default)]
    pub from: String,

    /// Sender display name (default: Form Intake)
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

/// Bearer token table standing in for the session issuer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token to subject id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_quota() -> Quota {
    Quota::per_minute(100)
}

fn default_auth_quota() -> Quota {
    Quota::per_minute(10)
}

fn default_api_quota() -> Quota {
    Quota::per_minute(200)
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_score_threshold() -> u8 {
    50
}

fn default_spam_burst() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_honeypot_fields() -> Vec<String> {
    ["_honeypot", "_hp", "website", "url", "fax"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_fill_time_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("FormIntake-Webhook/{}", env!("CARGO_PKG_VERSION"))
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_dashboard_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_from_name() -> String {
    "Form Intake".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            spam: SpamConfig::default(),
            webhook: WebhookConfig::default(),
            notifications: NotificationConfig::default(),
            email: EmailConfig::default(),
            auth: AuthConfig::default(),
            endpoints_file: None,
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public: default_public_quota(),
            auth: default_auth_quota(),
            api: default_api_quota(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            burst: default_spam_burst(),
            window_secs: default_window_secs(),
            honeypot_fields: default_honeypot_fields(),
            min_fill_time_ms: default_min_fill_time_ms(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_webhook_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            dashboard_base_url: default_dashboard_base_url(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            from_name: default_from_name(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl SpamConfig {
    /// Quota of the scorer's own submission tracker
    pub fn tracker_quota(&self) -> Quota {
        Quota {
            burst: self.burst,
            window_secs: self.window_secs,
        }
    }

    /// Get the minimum human fill time
    pub fn min_fill_time(&self) -> Duration {
        Duration::from_millis(self.min_fill_time_ms)
    }
}

impl WebhookConfig {
    /// Get the first retry delay
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Get the per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from `.env`, `form-intake.toml` and `INTAKE__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: Config = config::Config::builder()
            .add_source(config::File::with_name("form-intake").required(false))
            .add_source(
                config::Environment::with_prefix("INTAKE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would disable a component outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, quota) in [
            ("rate_limit.public", self.rate_limit.public),
            ("rate_limit.auth", self.rate_limit.auth),
            ("rate_limit.api", self.rate_limit.api),
            ("spam", self.spam.tracker_quota()),
        ] {
            if quota.burst == 0 || quota.window_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}: burst and window must be non-zero"
                )));
            }
            if quota.window_secs > MAX_WINDOW_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name}: window must not exceed {MAX_WINDOW_SECS} seconds"
                )));
            }
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.spam.score_threshold > 100 {
            return Err(ConfigError::Invalid(
                "spam.score_threshold must be within 0..=100".to_string(),
            ));
        }
        if self.webhook.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "webhook.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.notifications.workers == 0 || self.notifications.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notifications.workers and queue_capacity must be non-zero".to_string(),
            ));
        }
        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "metrics.path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Heuristic spam scoring.
//!
//! Rules are additive and the total is capped at 100:
//!
//! | Rule | Points | Flag |
//! |---|---|---|
//! | honeypot field filled | 100 | `honeypot_filled:<field>` |
//! | empty user agent | 30 | `empty_user_agent` |
//! | bot/tooling user agent | 40 | `bot_user_agent:<pattern>` |
//! | fill time under the minimum | 25 | `fast_submission` |
//! | source over its submission quota | 30 | `rate_limited` |
//! | a string field with more than two `http` | 15 | `multiple_links` |
//!
//! [`score`] is a pure function. [`SpamScorer`] wraps it with the scorer's
//! own per-source submission tracker, which is separate state from the
//! request rate limiters.

use crate::config::SpamConfig;
use crate::limiter::RateLimiter;
use crate::models::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MAX_SCORE: u32 = 100;

const HONEYPOT_POINTS: u32 = 100;
const EMPTY_USER_AGENT_POINTS: u32 = 30;
const BOT_USER_AGENT_POINTS: u32 = 40;
const FAST_SUBMISSION_POINTS: u32 = 25;
const RATE_LIMITED_POINTS: u32 = 30;
const MULTIPLE_LINKS_POINTS: u32 = 15;

/// Substrings of user agents sent by crawlers and scripting tools.
const BOT_PATTERNS: &[&str] = &[
    "bot", "crawler", "spider", "curl", "wget", "python", "scrapy", "headless",
];

/// Outcome of spam analysis, stored with the submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamScore {
    /// 0-100, higher is more likely spam
    pub score: u8,
    /// `score >= threshold`
    pub is_spam: bool,
    /// Rules that fired, in evaluation order
    pub flags: Vec<String>,
    /// Threshold the verdict was made against
    pub threshold: u8,
}

/// Inputs to [`score`].
#[derive(Debug, Clone, Copy)]
pub struct SpamSignals<'a> {
    pub user_agent: &'a str,
    pub data: &'a FieldMap,
    /// Client-reported time between form render and submit, if supplied
    pub fill_time: Option<Duration>,
    /// Whether the source is already over its submission quota
    pub rate_limited: bool,
}

/// Whether a honeypot field carries anything a human would not have typed.
fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Score one submission.
pub fn score(signals: &SpamSignals<'_>, config: &SpamConfig) -> SpamScore {
    let mut points: u32 = 0;
    let mut flags = Vec::new();

    for field in &config.honeypot_fields {
        if signals.data.get(field).is_some_and(is_filled) {
            points += HONEYPOT_POINTS;
            flags.push(format!("honeypot_filled:{field}"));
        }
    }

    if signals.user_agent.is_empty() {
        points += EMPTY_USER_AGENT_POINTS;
        flags.push("empty_user_agent".to_string());
    } else {
        let lowered = signals.user_agent.to_lowercase();
        if let Some(pattern) = BOT_PATTERNS.iter().find(|p| lowered.contains(*p)) {
            points += BOT_USER_AGENT_POINTS;
            flags.push(format!("bot_user_agent:{pattern}"));
        }
    }

    if let Some(fill_time) = signals.fill_time {
        if fill_time < config.min_fill_time() {
            points += FAST_SUBMISSION_POINTS;
            flags.push("fast_submission".to_string());
        }
    }

    if signals.rate_limited {
        points += RATE_LIMITED_POINTS;
        flags.push("rate_limited".to_string());
    }

    let link_heavy = signals.data.values().any(|value| match value {
        Value::String(s) => s.matches("http").count() > 2,
        _ => false,
    });
    if link_heavy {
        points += MULTIPLE_LINKS_POINTS;
        flags.push("multiple_links".to_string());
    }

    let score = points.min(MAX_SCORE) as u8;
    SpamScore {
        score,
        is_spam: score >= config.score_threshold,
        flags,
        threshold: config.score_threshold,
    }
}

/// Spam scorer with per-source submission tracking.
pub struct SpamScorer {
    config: SpamConfig,
    tracker: Arc<RateLimiter>,
}

impl SpamScorer {
    pub fn new(config: SpamConfig) -> Self {
        let tracker = Arc::new(RateLimiter::new("spam", config.tracker_quota()));
        Self { config, tracker }
    }

    pub fn config(&self) -> &SpamConfig {
        &self.config
    }

    /// The scorer's submission tracker, for sweeping.
    pub fn tracker(&self) -> &Arc<RateLimiter> {
        &self.tracker
    }

    /// Score a submission from `source` and record it against the source's quota.
    pub async fn evaluate(
        &self,
        source: &str,
        user_agent: &str,
        data: &FieldMap,
        fill_time: Option<Duration>,
    ) -> SpamScore {
        let rate_limited = self.tracker.is_exhausted(source).await;
        let result = score(
            &SpamSignals {
                user_agent,
                data,
                fill_time,
                rate_limited,
            },
            &self.config,
        );
        self.tracker.record(source).await;

        debug!(
            %source,
            score = result.score,
            is_spam = result.is_spam,
            flags = ?result.flags,
            "Scored submission"
        );
        result
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Abuse patterns for security testing.

use std::time::Duration;

/// What each simulated submission looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    /// Browser user agent, plausible fields, human fill time
    Human,
    /// A honeypot field is filled in
    Honeypot,
    /// Scripting or crawler user agent
    BotAgent,
    /// No user agent at all
    EmptyAgent,
    /// Human-looking, but submitted faster than a person can type
    FastFill,
    /// Message body stuffed with links
    LinkSpam,
}

/// Abuse pattern configuration.
#[derive(Debug, Clone)]
pub struct AbuseConfig {
    /// Total number of submissions to send
    pub total_requests: usize,
    /// Submissions per second
    pub requests_per_second: f64,
    /// Number of unique client IPs to simulate
    pub unique_ips: usize,
    /// Shape of every submission
    pub traffic: Traffic,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_ips: 1,
            traffic: Traffic::Human,
        }
    }
}

/// Predefined abuse patterns.
impl AbuseConfig {
    /// Single IP flood from a real-looking browser.
    pub fn single_ip_flood() -> Self {
        Self {
            total_requests: 300,
            requests_per_second: 1000.0,
            ..Default::default()
        }
    }

    /// Many IPs, a handful of submissions each.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            requests_per_second: 500.0,
            unique_ips: 100,
            ..Default::default()
        }
    }

    /// Form-filling bots that fall for the honeypot.
    pub fn honeypot_bots() -> Self {
        Self {
            total_requests: 50,
            unique_ips: 50,
            traffic: Traffic::Honeypot,
            ..Default::default()
        }
    }

    /// Scripted clients announcing themselves in the user agent.
    pub fn scripted_clients() -> Self {
        Self {
            total_requests: 60,
            unique_ips: 60,
            traffic: Traffic::BotAgent,
            ..Default::default()
        }
    }

    /// Clients that strip the user agent.
    pub fn anonymous_clients() -> Self {
        Self {
            total_requests: 20,
            unique_ips: 20,
            traffic: Traffic::EmptyAgent,
            ..Default::default()
        }
    }

    /// Browser automation that submits instantly.
    pub fn instant_submitters() -> Self {
        Self {
            total_requests: 20,
            unique_ips: 20,
            traffic: Traffic::FastFill,
            ..Default::default()
        }
    }

    /// Link spam from a real browser.
    pub fn link_spammers() -> Self {
        Self {
            total_requests: 20,
            unique_ips: 20,
            traffic: Traffic::LinkSpam,
            ..Default::default()
        }
    }

    /// One visitor per minute; never trips anything.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 30,
            requests_per_second: 1.0 / 60.0,
            ..Default::default()
        }
    }

    /// Delay between consecutive submissions.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }
}

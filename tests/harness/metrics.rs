// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome collection for abuse simulation results.

use std::collections::HashMap;
use std::time::Duration;

/// Possible outcomes for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Stored and scored below the threshold
    Accepted,
    /// Stored but marked as spam
    FlaggedSpam,
    /// Refused by the public rate limiter
    RateLimited,
    /// Refused by the pipeline
    Rejected,
}

/// Collects outcomes during a simulation.
#[derive(Debug, Default)]
pub struct AbuseMetrics {
    outcomes: HashMap<Outcome, usize>,
    requests_per_ip: HashMap<String, usize>,
    /// How often each spam flag fired
    flags: HashMap<String, usize>,
    latencies: Vec<Duration>,
}

impl AbuseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submission outcome.
    pub fn record(&mut self, outcome: Outcome, ip: &str, flags: &[String], latency: Duration) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_ip.entry(ip.to_string()).or_insert(0) += 1;
        for flag in flags {
            // Drop the per-field suffix, e.g. `honeypot_filled:fax`.
            let rule = flag.split(':').next().unwrap_or(flag);
            *self.flags.entry(rule.to_string()).or_insert(0) += 1;
        }
        self.latencies.push(latency);
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Number of stored submissions on which `rule` fired.
    pub fn flag_count(&self, rule: &str) -> usize {
        self.flags.get(rule).copied().unwrap_or(0)
    }

    pub fn unique_ips(&self) -> usize {
        self.requests_per_ip.len()
    }

    /// Ratio of submissions that were not accepted as clean.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (total - self.count(Outcome::Accepted)) as f64 / total as f64
    }

    pub fn median_latency(&self) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            accepted: self.count(Outcome::Accepted),
            flagged_spam: self.count(Outcome::FlaggedSpam),
            rate_limited: self.count(Outcome::RateLimited),
            rejected: self.count(Outcome::Rejected),
            block_rate: self.block_rate(),
            median_latency: self.median_latency(),
            unique_ips: self.unique_ips(),
        }
    }
}

/// Summary report of a simulation.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub accepted: usize,
    pub flagged_spam: usize,
    pub rate_limited: usize,
    pub rejected: usize,
    pub block_rate: f64,
    pub median_latency: Duration,
    pub unique_ips: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Abuse Simulation Report ===")?;
        writeln!(f, "Total Submissions: {}", self.total_requests)?;
        writeln!(f, "Accepted:          {}", self.accepted)?;
        writeln!(f, "Flagged Spam:      {}", self.flagged_spam)?;
        writeln!(f, "Rate Limited:      {}", self.rate_limited)?;
        writeln!(f, "Rejected:          {}", self.rejected)?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate * 100.0)?;
        writeln!(f, "Median Latency:    {:?}", self.median_latency)?;
        writeln!(f, "Unique IPs:        {}", self.unique_ips)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AbuseMetrics::new();
        metrics.record(Outcome::Accepted, "10.0.0.1", &[], Duration::from_micros(100));
        metrics.record(
            Outcome::FlaggedSpam,
            "10.0.0.1",
            &["honeypot_filled:fax".to_string()],
            Duration::from_micros(150),
        );
        metrics.record(Outcome::RateLimited, "10.0.0.2", &[], Duration::from_micros(50));

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.count(Outcome::Accepted), 1);
        assert_eq!(metrics.flag_count("honeypot_filled"), 1);
        assert_eq!(metrics.unique_ips(), 2);
        assert!((metrics.block_rate() - 2.0 / 3.0).abs() < 0.01);
    }
}

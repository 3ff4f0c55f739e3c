// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-source token bucket rate limiter.
//!
//! Every source key (normally the client IP) gets a bucket holding `burst`
//! tokens. The bucket is refilled to full once the window has elapsed since
//! its last reset. State lives in process memory only and is swept
//! periodically: visitors idle for more than twice the window are dropped.
//!
//! Independent limiter instances exist per traffic class, see
//! [`RateLimiters`].

use crate::config::{Quota, RateLimitConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining admissions in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the window rolls over
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Bucket state for one source.
#[derive(Debug, Clone, Copy)]
struct Visitor {
    tokens: u32,
    last_reset: Instant,
}

impl Visitor {
    fn full(burst: u32, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_reset: now,
        }
    }

    fn window_elapsed(&self, window: Duration, now: Instant) -> bool {
        now.duration_since(self.last_reset) > window
    }

    /// Refill to full if the window has rolled over.
    fn refresh(&mut self, quota: &Quota, now: Instant) {
        if self.window_elapsed(quota.window(), now) {
            self.tokens = quota.burst;
            self.last_reset = now;
        }
    }

    fn reset_in(&self, window: Duration, now: Instant) -> Duration {
        window.saturating_sub(now.duration_since(self.last_reset))
    }
}

/// Thread-safe rate limiter for one traffic class.
///
/// All state sits behind a single mutex; the critical sections are O(1)
/// map operations.
pub struct RateLimiter {
    name: &'static str,
    quota: Quota,
    visitors: Mutex<HashMap<String, Visitor>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given quota.
    pub fn new(name: &'static str, quota: Quota) -> Self {
        Self {
            name,
            quota,
            visitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Consume one admission for `key` if any remain.
    pub async fn check(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let window = self.quota.window();
        let mut visitors = self.visitors.lock().await;
        let visitor = visitors
            .entry(key.to_string())
            .or_insert_with(|| Visitor::full(self.quota.burst, now));
        visitor.refresh(&self.quota, now);

        if visitor.tokens > 0 {
            visitor.tokens -= 1;
            RateLimitResult::Allowed {
                remaining: visitor.tokens,
                reset_in: visitor.reset_in(window, now),
            }
        } else {
            let retry_after = visitor.reset_in(window, now);
            debug!(limiter = self.name, %key, ?retry_after, "Rate limit exceeded");
            RateLimitResult::Limited { retry_after }
        }
    }

    /// Admit `key`, consuming one token. Returns false once the quota is spent.
    pub async fn admit(&self, key: &str) -> bool {
        self.check(key).await.is_allowed()
    }

    /// Record an observation for `key` without ever rejecting it.
    ///
    /// Once the bucket is empty further records are no-ops until the window
    /// rolls over; [`RateLimiter::is_exhausted`] reports that state.
    pub async fn record(&self, key: &str) {
        let now = Instant::now();
        let mut visitors = self.visitors.lock().await;
        let visitor = visitors
            .entry(key.to_string())
            .or_insert_with(|| Visitor::full(self.quota.burst, now));
        visitor.refresh(&self.quota, now);
        visitor.tokens = visitor.tokens.saturating_sub(1);
    }

    /// Whether `key` has spent its quota for the current window.
    ///
    /// Does not create or refresh the visitor.
    pub async fn is_exhausted(&self, key: &str) -> bool {
        let now = Instant::now();
        let visitors = self.visitors.lock().await;
        match visitors.get(key) {
            Some(visitor) => {
                !visitor.window_elapsed(self.quota.window(), now) && visitor.tokens == 0
            }
            None => false,
        }
    }

    /// Drop visitors idle for more than twice the window. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_limit = self.quota.window().saturating_mul(2);
        let mut visitors = self.visitors.lock().await;
        let before = visitors.len();
        visitors.retain(|_, visitor| now.duration_since(visitor.last_reset) <= idle_limit);
        let removed = before - visitors.len();
        if removed > 0 {
            debug!(limiter = self.name, removed, "Swept idle visitors");
        }
        removed
    }

    /// Number of sources currently tracked.
    pub async fn tracked_sources(&self) -> usize {
        self.visitors.lock().await.len()
    }

    /// Run [`RateLimiter::sweep`] on a fixed interval for the life of the process.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.sweep().await;
            }
        })
    }
}

/// The limiter instances guarding each traffic class, with independent quotas.
#[derive(Clone)]
pub struct RateLimiters {
    /// Public submission traffic
    pub public: Arc<RateLimiter>,
    /// Authentication traffic
    pub auth: Arc<RateLimiter>,
    /// General API traffic
    pub api: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            public: Arc::new(RateLimiter::new("public", config.public)),
            auth: Arc::new(RateLimiter::new("auth", config.auth)),
            api: Arc::new(RateLimiter::new("api", config.api)),
        }
    }

    /// Start one sweeper per limiter.
    pub fn spawn_sweepers(&self, every: Duration) -> Vec<JoinHandle<()>> {
        [&self.public, &self.auth, &self.api]
            .into_iter()
            .map(|limiter| limiter.spawn_sweeper(every))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(burst: u32) -> RateLimiter {
        RateLimiter::new("test", Quota::per_minute(burst))
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_burst_admissions_per_window() {
        let limiter = limiter(5);

        for _ in 0..5 {
            assert!(limiter.admit("127.0.0.1").await);
        }
        assert!(!limiter.admit("127.0.0.1").await);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!limiter.admit("127.0.0.1").await, "still inside the window");
    }

    #[tokio::test(start_paused = true)]
    async fn window_rollover_refills() {
        let limiter = limiter(2);
        assert!(limiter.admit("a").await);
        assert!(limiter.admit("a").await);
        assert!(!limiter.admit("a").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.admit("a").await);
        assert!(limiter.admit("a").await);
        assert!(!limiter.admit("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn limited_reports_remaining_window() {
        let limiter = limiter(1);
        assert!(limiter.admit("a").await);
        tokio::time::advance(Duration::from_secs(20)).await;

        match limiter.check("a").await {
            RateLimitResult::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(40));
            }
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }
    }

    #[tokio::test]
    async fn sources_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.admit("10.0.0.1").await);
        assert!(!limiter.admit("10.0.0.1").await);
        assert!(limiter.admit("10.0.0.2").await);
    }

    #[tokio::test(start_paused = true)]
    async fn record_never_rejects_but_exhausts() {
        let limiter = limiter(3);
        assert!(!limiter.is_exhausted("a").await);

        for _ in 0..3 {
            limiter.record("a").await;
        }
        assert!(limiter.is_exhausted("a").await);

        limiter.record("a").await;
        assert!(limiter.is_exhausted("a").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!limiter.is_exhausted("a").await);
    }

    #[tokio::test]
    async fn is_exhausted_does_not_track_unknown_sources() {
        let limiter = limiter(3);
        assert!(!limiter.is_exhausted("nobody").await);
        assert_eq!(limiter.tracked_sources().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_idle_visitors() {
        let limiter = limiter(3);
        limiter.record("old").await;
        tokio::time::advance(Duration::from_secs(100)).await;
        limiter.record("fresh").await;
        tokio::time::advance(Duration::from_secs(30)).await;

        // "old" last reset 130s ago (> 120s), "fresh" 30s ago.
        assert_eq!(limiter.sweep().await, 1);
        assert_eq!(limiter.tracked_sources().await, 1);
        assert!(!limiter.is_exhausted("fresh").await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_with_huge_window_keeps_visitors() {
        let limiter = RateLimiter::new(
            "wide",
            Quota {
                burst: 1,
                window_secs: u64::MAX,
            },
        );
        limiter.record("10.0.0.1").await;
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(limiter.sweep().await, 0);
        assert!(limiter.is_exhausted("10.0.0.1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_on_interval() {
        let limiter = Arc::new(limiter(3));
        limiter.record("a").await;
        let handle = limiter.spawn_sweeper(Duration::from_secs(60));

        // Sleeping lets the paused clock auto-advance through each tick.
        tokio::time::sleep(Duration::from_secs(181)).await;
        assert_eq!(limiter.tracked_sources().await, 0);
        handle.abort();
    }

    #[tokio::test]
    async fn registry_quotas_are_independent() {
        let limiters = RateLimiters::new(&RateLimitConfig {
            auth: Quota::per_minute(1),
            ..Default::default()
        });
        assert!(limiters.auth.admit("ip").await);
        assert!(!limiters.auth.admit("ip").await);
        assert!(limiters.public.admit("ip").await);
        assert!(limiters.api.admit("ip").await);
    }
}

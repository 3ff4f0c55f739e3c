// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-budget retry with exponential backoff.
//!
//! With the default policy an operation is tried three times, sleeping one
//! second after the first failure and two seconds after the second.

use crate::config::WebhookConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Always at least 1.
    pub max_attempts: u32,
    /// Wait after the first failure; doubled for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&WebhookConfig> for RetryPolicy {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff after the given failed attempt (1-based), or `None` when the
    /// budget is spent.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number. On success the
    /// value is returned with the attempt that produced it.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<(T, u32), Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(error) => match self.backoff_after(attempt) {
                    Some(delay) => {
                        warn!(attempt, error = %error, retry_in_ms = delay.as_millis() as u64, "Attempt failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        debug!(attempt, error = %error, "Retry budget spent");
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: error,
                        });
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn default_schedule_is_one_then_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.backoff_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.backoff_after(3), None);
    }

    #[test]
    fn longer_budgets_keep_doubling() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        let delays: Vec<_> = (1..5).filter_map(|a| policy.backoff_after(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn single_attempt_never_backs_off() {
        assert_eq!(RetryPolicy::single_attempt().backoff_after(1), None);
    }

    #[test]
    fn zero_attempts_in_config_still_tries_once() {
        let config = WebhookConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_failure_uses_whole_budget_with_backoff() {
        let policy = RetryPolicy::default();
        let started = Instant::now();
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result: Result<((), u32), _> = policy
            .execute(|attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push((attempt, started.elapsed()));
                    Err::<(), _>("boom")
                }
            })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "boom");

        let calls = calls.lock().unwrap();
        let at: Vec<_> = calls.iter().map(|(_, t)| t.as_secs()).collect();
        assert_eq!(at, vec![0, 1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err("not yet")
                    } else {
                        Ok(204u16)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok((204, 2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

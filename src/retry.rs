// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Fixed-delay retry loop for endpoints that sometimes answer with nothing.
//!
//! Only an empty answer is retried. Any error ends the loop at once, and a
//! value that arrives is returned even if the token is cancelled later.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ClipConfig;
use crate::error::{MediaError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Pause after an empty attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClipConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClipConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
        }
    }
}

/// Result of a single attempt.
pub enum Attempt<T> {
    Done(T),
    /// Succeeded but carried no data; worth another try.
    Empty,
    Fail(MediaError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Done { value: T, attempts: u32 },
    /// Every attempt came back empty.
    Exhausted { attempts: u32 },
}

/// Run `operation` until it yields a value, fails, or `max_attempts` empty
/// answers have been seen. `operation` receives the 1-based attempt number.
pub async fn retry_on_empty<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut operation: F,
) -> Result<RetryOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    for attempt in 1..=policy.max_attempts {
        if token.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        match operation(attempt).await {
            Attempt::Done(value) => return Ok(RetryOutcome::Done { value, attempts: attempt }),
            Attempt::Fail(err) => return Err(err),
            Attempt::Empty => {
                if attempt == policy.max_attempts {
                    break;
                }
                warn!(
                    attempt,
                    max = policy.max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Empty payload, retrying"
                );
                tokio::select! {
                    _ = token.cancelled() => return Err(MediaError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
        }
    }

    Ok(RetryOutcome::Exhausted { attempts: policy.max_attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn policy(max_attempts: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy { max_attempts, delay: Duration::from_millis(delay_ms) }
    }

    #[test]
    fn default_policy_is_three_attempts_two_seconds_apart() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay, Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn first_value_is_returned() {
        let token = CancellationToken::new();
        let out = retry_on_empty(&policy(3, 10), &token, |_| async { Attempt::Done(7u32) }).await;
        assert_eq!(out.unwrap(), RetryOutcome::Done { value: 7, attempts: 1 });
    }

    #[tokio::test]
    async fn failure_is_not_retried() {
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let out: Result<RetryOutcome<u32>> = retry_on_empty(&policy(3, 10), &token, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Attempt::Fail(MediaError::NoSegments) }
        })
        .await;
        assert!(matches!(out, Err(MediaError::NoSegments)));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn empties_exhaust_with_delay_between_attempts() {
        let token = CancellationToken::new();
        let started = Instant::now();
        let calls = AtomicU32::new(0);
        let out: Result<RetryOutcome<u32>> = retry_on_empty(&policy(3, 20), &token, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Attempt::Empty }
        })
        .await;
        assert_eq!(out.unwrap(), RetryOutcome::Exhausted { attempts: 3 });
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        // Two pauses, none after the last attempt.
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn value_after_empties_reports_attempt() {
        let token = CancellationToken::new();
        let out = retry_on_empty(&policy(3, 1), &token, |attempt| async move {
            if attempt < 3 { Attempt::Empty } else { Attempt::Done("clip") }
        })
        .await;
        assert_eq!(out.unwrap(), RetryOutcome::Done { value: "clip", attempts: 3 });
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_pause() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        let out: Result<RetryOutcome<u32>> =
            retry_on_empty(&policy(3, 60_000), &token, |_| async { Attempt::Empty }).await;
        assert!(matches!(out, Err(MediaError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

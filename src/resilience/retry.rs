//! Retry with linear backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded-attempt retry policy with linear backoff.
///
/// A policy of `max_retries = 2` performs up to three attempts, sleeping
/// `retry_interval * 1` before the second and `retry_interval * 2` before
/// the third.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Base sleep interval; retry n waits n times this.
    pub retry_interval: Duration,
}

impl RetryPolicy {
    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay slept before the given retry (1-based retry number).
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.retry_interval.saturating_mul(retry)
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// The closure receives the zero-based attempt number. The error of the
/// last attempt is returned; intermediate failures are logged, never
/// swallowed silently.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_before(attempt)).await;
        }
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_retries => {
                tracing::warn!(
                    attempt = attempt + 1,
                    attempts = policy.attempts(),
                    error = %error,
                    "attempt failed, retrying"
                );
                attempt += 1;
            }
            Err(error) => {
                tracing::warn!(
                    attempts = policy.attempts(),
                    error = %error,
                    "all attempts exhausted"
                );
                return Err(error);
            }
        }
    }
}

//! Exponential backoff for content-service calls that are worth repeating.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that know whether another attempt could succeed.
pub trait Retryable: Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::content::FetchError {
    fn is_retryable(&self) -> bool {
        crate::content::FetchError::is_retryable(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero is treated as one.
    pub attempts: u32,
    /// Wait before the second attempt; doubles afterwards
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            max_delay,
        }
    }

    /// Cache pre-warm after a publish: 3 attempts, waits of 250ms then 500ms.
    pub fn prewarm() -> Self {
        Self::new(3, Duration::from_millis(250), Duration::from_secs(1))
    }

    /// Wait before attempt `n` (1-based). The first attempt never waits.
    fn backoff(&self, n: u32) -> Duration {
        if n <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(n - 2);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::prewarm()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up. The last error is returned.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut n = 1;

    loop {
        let wait = policy.backoff(n);
        if !wait.is_zero() {
            debug!("{}: waiting {:?} before attempt {}/{}", label, wait, n, attempts);
            sleep(wait).await;
        }

        let error = match operation().await {
            Ok(value) => {
                if n > 1 {
                    debug!("{}: succeeded on attempt {}/{}", label, n, attempts);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            debug!("{}: giving up on non-retryable error: {}", label, error);
            return Err(error);
        }
        if n >= attempts {
            warn!("{}: all {} attempts failed, last error: {}", label, attempts, error);
            return Err(error);
        }

        warn!("{}: attempt {}/{} failed ({}), retrying", label, n, attempts, error);
        n += 1;
    }
}

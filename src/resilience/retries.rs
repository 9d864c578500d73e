//! Retry logic.
//!
//! # Responsibilities
//! - Run a fallible async operation up to `max_attempts` times
//! - Wait with exponential backoff + jitter between attempts
//! - Surface the last error once attempts are exhausted
//!
//! # Design Decisions
//! - Errors classify themselves through [`Retryable`]
//! - Non-retryable errors return immediately, without sleeping
//! - Every failed attempt is logged; exhaustion is left to the caller

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Classifies an error as transient or permanent.
pub trait Retryable {
    /// Returns true if another attempt may succeed.
    fn is_retryable(&self) -> bool;
}

/// Attempt limit and backoff bounds for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay = ?delay,
                    error = %e,
                    "Remote call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Caller-side retry with exponential backoff.
//!
//! The gate itself never retries. Callers wrap an operation in
//! [`with_retry`], which retries only failures that report themselves as
//! retryable and invokes a reset hook (typically the oracle's `reset()`)
//! between attempts so stale connections are not reused.

use std::future::Future;
use std::time::Duration;

/// Maximum number of retry attempts after the initial call.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, ...).
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;

/// Failures that know whether an unchanged retry may succeed.
pub trait Retryable {
    /// Whether the same call may succeed later.
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::error::GateError {
    fn is_retryable(&self) -> bool {
        crate::error::GateError::is_retryable(self)
    }
}

/// Retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial call.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op`, retrying retryable failures up to `policy.max_retries` times.
///
/// `reset` runs before every retry. Non-retryable failures are returned
/// immediately.
pub async fn with_retry<T, E, F, Fut, R>(policy: &RetryPolicy, reset: R, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
    R: Fn(),
{
    for attempt in 0..policy.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "operation failed, retrying in {delay:?}: {e}"
                );
                reset();
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    // Final attempt, no more retries.
    op().await
}

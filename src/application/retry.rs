//! Retry decisions with exponential backoff.
//!
//! Attempt `k` (zero-based count of retries already made) waits
//! `min(base_delay * 2^k, max_delay)`. A server-provided `Retry-After` raises
//! the delay to at least that value, still capped at `max_delay`. Optional
//! jitter adds up to 20% on top of the capped delay.

use std::time::Duration;

use rand::Rng;

use crate::domain::RequestDescriptor;
use crate::error::RequestError;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then re-submit at the original priority.
    Retry { delay: Duration },
    /// Retryable, but the retry budget is spent.
    Exhausted,
    /// Not retryable; surface the error as is.
    Terminal,
}

/// Decides whether and when a failed request is retried.
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn decide(&self, request: &RequestDescriptor, error: &RequestError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Terminal;
        }
        if !request.can_retry() {
            return RetryDecision::Exhausted;
        }

        let mut delay = self.backoff(request.retry_count());
        if let Some(retry_after) = error.retry_after() {
            delay = delay.max(retry_after.min(self.policy.max_delay));
        }
        if self.policy.jitter {
            delay += jitter(delay);
        }
        RetryDecision::Retry { delay }
    }

    /// Capped exponential delay before retry number `retry_count + 1`.
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.policy
            .base_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay)
    }

    /// Error surfaced for a decision that ends the request.
    #[must_use]
    pub fn terminal_error(
        decision: RetryDecision,
        request: &RequestDescriptor,
        error: RequestError,
    ) -> RequestError {
        match decision {
            RetryDecision::Exhausted => RequestError::MaxRetriesExceeded {
                attempts: request.retry_count() + 1,
                last: Box::new(error),
            },
            RetryDecision::Retry { .. } | RetryDecision::Terminal => error,
        }
    }
}

/// Up to 20% of `delay`.
fn jitter(delay: Duration) -> Duration {
    let range_ms = u64::try_from(delay.as_millis() / 5).unwrap_or(u64::MAX);
    if range_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=range_ms))
}

//! Call-site retry policies for request execution
//!
//! Plain request execution never retries on its own; callers opt in by
//! passing a policy. The policy is deliberately narrow:
//! - bounded attempts with linear backoff and a delay cap
//! - a `Retry-After` header overrides the computed delay
//! - transport faults and rate limits are retryable; temporary
//!   unavailability only when the service sent a `Retry-After` hint
//! - credential failures are never retried

use std::future::Future;
use std::time::Duration;

use crate::http::error::ServiceErrorKind;
use crate::{Error, Result};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Backoff grows linearly in this step
    pub base_delay_ms: u64,
    /// Upper bound on any computed delay
    pub max_delay_ms: u64,
    /// Whether rate-limited responses are retried at all
    pub retry_rate_limited: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            retry_rate_limited: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the linear backoff step in milliseconds
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Sets the delay cap in milliseconds
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Enables or disables retrying rate-limited responses
    pub fn with_rate_limit_retries(mut self, retry_rate_limited: bool) -> Self {
        self.retry_rate_limited = retry_rate_limited;
        self
    }

    /// Rejects configurations that could never execute a request
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("max_attempts must be at least 1"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::configuration(
                "base_delay_ms must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Whether this policy retries after the given failure
    pub fn should_retry(&self, error: &Error) -> bool {
        match error {
            Error::Transport { .. } => true,
            Error::Service(service) => match service.kind {
                // Credential failures never improve on retry
                ServiceErrorKind::Unauthorized => false,
                ServiceErrorKind::TooManyRequests => self.retry_rate_limited,
                // Unavailability is transient only when the service said
                // when to come back
                ServiceErrorKind::ServiceUnavailable => service.retry_after.is_some(),
                _ => false,
            },
            _ => false,
        }
    }

    /// Delay before the retry following `attempt` (1-based). A server-sent
    /// `Retry-After` wins over the linear schedule.
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        if let Error::Service(service) = error {
            if let Some(seconds) = service.retry_after {
                return Duration::from_secs(seconds);
            }
        }
        let millis = self
            .base_delay_ms
            .saturating_mul(u64::from(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Drives a request closure under a retry policy. The closure is invoked at
/// most `max_attempts` times; the final failure always surfaces unchanged.
pub async fn execute_with_retry<F, Fut, T>(mut request_fn: F, policy: &RetryPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    policy.validate()?;
    let mut attempt = 1u32;
    loop {
        match request_fn().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_attempts || !policy.should_retry(&error) {
                    if attempt > 1 {
                        log::error!("request failed after {} attempt(s): {}", attempt, error);
                    }
                    return Err(error);
                }
                let delay = policy.delay_for(attempt, &error);
                log::warn!(
                    "request attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

//! Retry logic with exponential backoff and jitter.
//!
//! Transfer submissions are retried on transient service errors:
//! - delay for attempt `n` is `base * 2^(n-1)`, capped at `max_delay`
//! - a uniform jitter of up to 50% of that delay is added on top
//! - sleeping only happens between attempts

use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use super::sleeper::Sleeper;
use super::transfer_client::TransferError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Capped delay before jitter for a failed attempt (1-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Delay actually slept after a failed attempt (1-indexed).
    pub fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let mut rng = rand::rng();
        let extra = rng.random_range(0.0..=0.5 * delay.as_secs_f64());
        delay + Duration::from_secs_f64(extra)
    }
}

/// Statistics about a retry operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    /// Number of attempts made.
    pub attempts: u32,
    /// Total delay slept between attempts.
    pub total_delay: Duration,
    /// Whether the operation ultimately succeeded.
    pub success: bool,
}

/// Why a retried operation gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure {
    /// The error is not on the retry whitelist
    Permanent(TransferError),
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: TransferError },
}

/// Retry a transfer-service call with exponential backoff.
///
/// # Arguments
/// * `policy` - Retry configuration
/// * `sleeper` - Where backoff waits are spent
/// * `label` - Short description used in log messages
/// * `operation` - The call to retry
///
/// # Returns
/// A tuple of (Result, RetryStats)
pub fn retry_with_backoff<T, F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut operation: F,
) -> (Result<T, RetryFailure>, RetryStats)
where
    F: FnMut() -> Result<T, TransferError>,
{
    let mut stats = RetryStats::default();
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        stats.attempts = attempt;

        let error = match operation() {
            Ok(value) => {
                stats.success = true;
                if attempt > 1 {
                    debug!("{} succeeded after {} attempts", label, attempt);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            debug!("{}: error is not retryable: {}", label, error);
            return (Err(RetryFailure::Permanent(error)), stats);
        }

        if attempt == max_attempts {
            warn!("{}: all {} attempts exhausted. Last error: {}", label, max_attempts, error);
            return (Err(RetryFailure::Exhausted { attempts: attempt, last: error }), stats);
        }

        let delay = policy.sleep_duration(attempt);
        stats.total_delay += delay;
        warn!(
            "[submit retry {}/{}] {}: {}; sleeping {:.1}s",
            attempt,
            max_attempts,
            label,
            error,
            delay.as_secs_f64()
        );
        sleeper.sleep(delay);
    }

    unreachable!("retry loop returns on the last attempt")
}

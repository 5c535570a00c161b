//! Retry policy.
//!
//! # Responsibilities
//! - Hold the per-operation-kind attempt limit and backoff shape
//! - Decide whether another attempt on the same backend is allowed
//!
//! # Design Decisions
//! - Only throttling is retried on the same backend; hard failures move on
//! - Each backend in a chain gets its own fresh attempt count
//! - Constants come from configuration, never from code

use std::time::Duration;

use crate::config::RetryConfig;

/// Attempt limit and backoff shape for one operation kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per backend, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Attempts allowed per backend; a configured zero still allows one call.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// True if attempt number `attempt` (1-based, just failed) may be followed by another.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            jitter: config.jitter,
        }
    }
}

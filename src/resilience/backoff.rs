//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

use crate::resilience::retries::RetryPolicy;

/// Calculate the delay to wait after the failed attempt `attempt` (0-based).
///
/// The delay is `base * multiplier^attempt`, capped at `max_delay`. Jitter
/// (0 to 10% of the delay) is added when enabled and never pushes the
/// result past the cap.
pub fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let capped = exponential(attempt, policy);

    if !policy.jitter {
        return capped;
    }

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    (capped + Duration::from_millis(jitter)).min(policy.max_delay)
}

/// Backoff for a throttled attempt, honoring a server-suggested delay.
///
/// The suggestion can lengthen the wait but the cap still applies.
pub fn throttle_delay(attempt: u32, policy: &RetryPolicy, suggested: Option<Duration>) -> Duration {
    let delay = calculate_backoff(attempt, policy);
    match suggested {
        Some(hint) => delay.max(hint).min(policy.max_delay),
        None => delay,
    }
}

fn exponential(attempt: u32, policy: &RetryPolicy) -> Duration {
    let factor = policy.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
    let millis = policy.base_delay.as_millis() as f64 * factor;
    let max_ms = policy.max_delay.as_millis() as f64;

    if !millis.is_finite() || millis >= max_ms {
        policy.max_delay
    } else {
        Duration::from_millis(millis as u64)
    }
}

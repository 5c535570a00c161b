//! Resilient external call executor.
//!
//! # Responsibilities
//! - Block on the rate budget before every attempt
//! - Retry throttled calls on the same backend with capped backoff
//! - Fall through the chain on hard failures or exhausted retries
//! - Surface a typed result; never panic or propagate backend errors
//!
//! # Design Decisions
//! - Only successful calls are recorded in the rate budget
//! - Each backend starts with a fresh attempt count
//! - Payload validation belongs to the callable, which reports bad
//!   payloads as hard errors

use std::future::Future;

use crate::observability::metrics;
use crate::resilience::backoff::throttle_delay;
use crate::resilience::chain::{Backend, FallbackChain};
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::error::{
    AttemptOutcome, AttemptRecord, CallError, ExecuteError, OperationResult, Success,
};
use crate::resilience::rate_budget::RateBudget;
use crate::resilience::retries::RetryPolicy;

/// Runs fallible external calls under a rate budget, retry policy and
/// fallback chain.
#[derive(Debug, Clone, Default)]
pub struct Executor<C = TokioClock> {
    clock: C,
}

impl Executor<TokioClock> {
    /// Executor on the wall clock.
    pub fn tokio() -> Self {
        Self { clock: TokioClock }
    }
}

impl<C: Clock> Executor<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Try each backend of `chain` in order until one succeeds.
    ///
    /// `call` performs one attempt against the given backend. Backends are
    /// shared handles, so a callable that needs to move one into its future
    /// clones it.
    pub async fn execute<B, T, F, Fut>(
        &self,
        chain: &FallbackChain<B>,
        policy: &RetryPolicy,
        budget: &RateBudget,
        mut call: F,
    ) -> OperationResult<T>
    where
        B: Backend,
        F: FnMut(&B) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let kind = chain.kind();
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        if chain.is_empty() {
            tracing::warn!(kind = %kind, "No backends configured");
            metrics::record_exhausted(kind.as_str());
            return Err(ExecuteError::AllBackendsExhausted { kind, attempts });
        }

        for backend in chain.backends() {
            let id = backend.id();
            let mut attempt: u32 = 0;

            loop {
                attempt += 1;
                let (slot, rate_wait) = budget.reserve(&self.clock).await;

                tracing::debug!(kind = %kind, backend = id, attempt, waited = ?rate_wait, "Calling backend");

                let err = match call(backend).await {
                    Ok(value) => {
                        slot.commit(self.clock.now());
                        metrics::record_call(kind.as_str(), id, AttemptOutcome::Succeeded.as_str());
                        if !attempts.is_empty() {
                            tracing::info!(kind = %kind, backend = id, attempt, "Operation succeeded after earlier failures");
                        }
                        attempts.push(AttemptRecord {
                            backend: id.to_string(),
                            attempt,
                            outcome: AttemptOutcome::Succeeded,
                            rate_wait,
                            backoff: None,
                            message: None,
                        });
                        return Ok(Success {
                            value,
                            backend: id.to_string(),
                            attempts,
                        });
                    }
                    Err(err) => err,
                };
                drop(slot);

                let outcome = AttemptOutcome::Failed(err.kind());
                metrics::record_call(kind.as_str(), id, outcome.as_str());
                let mut record = AttemptRecord {
                    backend: id.to_string(),
                    attempt,
                    outcome,
                    rate_wait,
                    backoff: None,
                    message: Some(err.to_string()),
                };

                match &err {
                    CallError::Throttled { retry_after, .. } if policy.allows_retry_after(attempt) => {
                        let delay = throttle_delay(attempt - 1, policy, *retry_after);
                        tracing::warn!(
                            kind = %kind,
                            backend = id,
                            attempt,
                            max_attempts = policy.attempts(),
                            delay = ?delay,
                            "Throttled, backing off before retry"
                        );
                        metrics::record_retry(kind.as_str(), id);
                        record.backoff = Some(delay);
                        attempts.push(record);
                        self.clock.sleep(delay).await;
                        continue;
                    }
                    CallError::Throttled { .. } => {
                        tracing::warn!(kind = %kind, backend = id, attempt, "Retries exhausted, trying next backend");
                    }
                    CallError::Unavailable(reason) => {
                        tracing::info!(kind = %kind, backend = id, reason = %reason, "Backend unavailable, trying next backend");
                    }
                    CallError::Backend(reason) => {
                        tracing::warn!(kind = %kind, backend = id, error = %reason, "Backend failed, trying next backend");
                    }
                }

                attempts.push(record);
                break;
            }
        }

        tracing::error!(kind = %kind, attempts = attempts.len(), "All backends exhausted");
        metrics::record_exhausted(kind.as_str());
        Err(ExecuteError::AllBackendsExhausted { kind, attempts })
    }
}

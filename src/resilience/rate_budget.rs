//! Rolling-window rate budget.
//!
//! Caps the number of successful external operations inside any trailing
//! window. Callers block until a slot is free; nothing is ever rejected.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::config::RateBudgetConfig;
use crate::observability::metrics;
use crate::resilience::clock::Clock;

/// Log of recent operations plus slots handed out but not yet settled.
#[derive(Debug, Default)]
struct BudgetState {
    log: VecDeque<Instant>,
    in_flight: u32,
}

impl BudgetState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.log.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.log.pop_front();
            } else {
                break;
            }
        }
    }
}

enum Wait {
    Until(Duration),
    Release,
}

/// Maximum operations per rolling window for one API class.
#[derive(Debug)]
pub struct RateBudget {
    name: String,
    max_operations: u32,
    window: Duration,
    padding: Duration,
    state: Mutex<BudgetState>,
    released: Notify,
}

impl RateBudget {
    /// Create a budget; `max_operations == 0` disables limiting.
    pub fn new(name: impl Into<String>, max_operations: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_operations,
            window,
            padding: Duration::ZERO,
            state: Mutex::new(BudgetState::default()),
            released: Notify::new(),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &RateBudgetConfig) -> Self {
        Self::new(name, config.max_operations, Duration::from_secs(config.window_secs))
            .with_padding(Duration::from_millis(config.padding_ms))
    }

    /// Extra time to wait once the oldest operation has left the window.
    pub fn with_padding(mut self, padding: Duration) -> Self {
        self.padding = padding;
        self
    }

    /// A budget that never blocks.
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self::new(name, 0, Duration::ZERO)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_operations(&self) -> u32 {
        self.max_operations
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_operations == 0
    }

    /// Operations recorded inside the window ending at `now`.
    pub fn recorded_in_window(&self, now: Instant) -> usize {
        let mut state = self.lock();
        state.prune(now, self.window);
        state.log.len()
    }

    /// Wait until a slot is available and hold it.
    ///
    /// Returns the reservation and the time spent waiting. The slot is
    /// turned into a recorded operation by [`Reservation::commit`]; dropping
    /// the reservation gives it back.
    pub async fn reserve<C: Clock>(&self, clock: &C) -> (Reservation<'_>, Duration) {
        let started = clock.now();

        loop {
            let released = self.released.notified();

            let wait = {
                let mut state = self.lock();
                let now = clock.now();
                state.prune(now, self.window);

                let used = state.log.len() as u32 + state.in_flight;
                if self.is_unlimited() || used < self.max_operations {
                    state.in_flight += 1;
                    None
                } else if state.log.len() as u32 >= self.max_operations {
                    let oldest = state.log.front().copied().unwrap_or(now);
                    let until_free = match oldest.checked_add(self.window) {
                        Some(free_at) => free_at.saturating_duration_since(now),
                        None => self.window,
                    };
                    Some(Wait::Until(until_free.saturating_add(self.padding)))
                } else {
                    Some(Wait::Release)
                }
            };

            match wait {
                None => break,
                Some(Wait::Until(delay)) => {
                    tracing::info!(
                        budget = %self.name,
                        max_operations = self.max_operations,
                        delay = ?delay,
                        "Rate budget exhausted, waiting for a free slot"
                    );
                    clock.sleep(delay).await;
                }
                Some(Wait::Release) => {
                    tracing::debug!(budget = %self.name, "Waiting for an in-flight operation to settle");
                    released.await;
                }
            }
        }

        let waited = clock.now().saturating_duration_since(started);
        if !waited.is_zero() {
            metrics::record_rate_wait(&self.name, waited);
        }

        (
            Reservation {
                budget: self,
                settled: false,
            },
            waited,
        )
    }

    fn settle(&self, at: Option<Instant>) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if let Some(at) = at {
                state.prune(at, self.window);
                state.log.push_back(at);
            }
        }
        self.released.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A held slot in a [`RateBudget`].
#[derive(Debug)]
pub struct Reservation<'a> {
    budget: &'a RateBudget,
    settled: bool,
}

impl Reservation<'_> {
    /// Record the operation as completed at `at`.
    pub fn commit(mut self, at: Instant) {
        self.settled = true;
        self.budget.settle(Some(at));
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.budget.settle(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    #[tokio::test]
    async fn test_under_capacity_does_not_wait() {
        let clock = ManualClock::new();
        let budget = RateBudget::new("text", 3, Duration::from_secs(60));

        for _ in 0..3 {
            let (slot, waited) = budget.reserve(&clock).await;
            assert_eq!(waited, Duration::ZERO);
            slot.commit(clock.now());
        }
        assert!(clock.sleeps().is_empty());
        assert_eq!(budget.recorded_in_window(clock.now()), 3);
    }

    #[tokio::test]
    async fn test_full_budget_waits_for_oldest_plus_padding() {
        let clock = ManualClock::new();
        let budget = RateBudget::new("text", 2, Duration::from_secs(60))
            .with_padding(Duration::from_secs(1));

        let (slot, _) = budget.reserve(&clock).await;
        slot.commit(clock.now());
        clock.advance(Duration::from_secs(10));
        let (slot, _) = budget.reserve(&clock).await;
        slot.commit(clock.now());

        let (_slot, waited) = budget.reserve(&clock).await;
        assert_eq!(waited, Duration::from_secs(51));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(51)]);
    }

    #[tokio::test]
    async fn test_dropped_reservation_is_not_recorded() {
        let clock = ManualClock::new();
        let budget = RateBudget::new("image", 1, Duration::from_secs(60));

        let (slot, _) = budget.reserve(&clock).await;
        drop(slot);
        assert_eq!(budget.recorded_in_window(clock.now()), 0);

        let (_slot, waited) = budget.reserve(&clock).await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unlimited_never_blocks() {
        let clock = ManualClock::new();
        let budget = RateBudget::unlimited("convert");
        for _ in 0..100 {
            let (slot, _) = budget.reserve(&clock).await;
            slot.commit(clock.now());
        }
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_sliding_window_never_exceeds_capacity() {
        let clock = ManualClock::new();
        let window = Duration::from_secs(30);
        let budget = RateBudget::new("text", 4, window);
        let mut stamps = Vec::new();

        for i in 0..25u64 {
            let (slot, _) = budget.reserve(&clock).await;
            let now = clock.now();
            slot.commit(now);
            stamps.push(now);
            clock.advance(Duration::from_millis(700 * (i % 5)));
        }

        for (i, start) in stamps.iter().enumerate() {
            let inside = stamps[i..]
                .iter()
                .filter(|t| t.saturating_duration_since(*start) < window)
                .count();
            assert!(inside <= 4, "window starting at #{i} holds {inside}");
        }
    }

    #[tokio::test]
    async fn test_in_flight_slot_blocks_until_released() {
        let clock = ManualClock::new();
        let budget = std::sync::Arc::new(RateBudget::new("image", 1, Duration::from_secs(60)));
        let (slot, _) = budget.reserve(&clock).await;

        let waiter = {
            let budget = budget.clone();
            let clock = clock.clone();
            tokio::spawn(async move {
                let (_slot, waited) = budget.reserve(&clock).await;
                waited
            })
        };

        tokio::task::yield_now().await;
        drop(slot);
        let waited = waiter.await.unwrap();
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unbounded_window_keeps_waiting() {
        let clock = crate::resilience::clock::TokioClock;
        let budget = RateBudget::new("text", 1, Duration::MAX);
        let (slot, _) = budget.reserve(&clock).await;
        slot.commit(clock.now());

        let second = tokio::time::timeout(Duration::from_millis(20), budget.reserve(&clock)).await;
        assert!(second.is_err());
        assert_eq!(budget.recorded_in_window(clock.now()), 1);
    }
}

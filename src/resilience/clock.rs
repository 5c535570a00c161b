//! Time source for the resilience layer.
//!
//! Everything that waits (rate-budget blocking, retry backoff) goes through
//! a [`Clock`] so tests can drive virtual time instead of sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Notify;

/// A source of monotonic time that can also suspend the caller.
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend for `dur`.
    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()>;

    /// Suspend until `deadline` has been reached.
    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        self.sleep(deadline.saturating_duration_since(self.now()))
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        (**self).sleep(dur)
    }

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        (**self).sleep_until(deadline)
    }
}

/// Wall clock backed by Tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(dur).boxed()
    }

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).boxed()
    }
}

/// Virtual clock. `sleep` returns immediately after advancing time by the
/// requested amount; every requested sleep is kept for inspection.
///
/// `sleep_until` does not move time. It resolves once other sleeps or
/// [`ManualClock::advance`] carry the clock past the deadline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
    advanced: Arc<Notify>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                sleeps: Vec::new(),
            })),
            advanced: Arc::new(Notify::new()),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, dur: Duration) {
        self.lock().now += dur;
        self.advanced.notify_waiters();
    }

    /// All durations passed to [`Clock::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Sum of every recorded sleep.
    pub fn total_slept(&self) -> Duration {
        self.lock().sleeps.iter().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // A poisoned lock only means a test panicked mid-update; the
        // state is still a plain value.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        {
            let mut state = self.lock();
            state.now += dur;
            state.sleeps.push(dur);
        }
        self.advanced.notify_waiters();
        futures_util::future::ready(()).boxed()
    }

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        let clock = self.clone();
        async move {
            loop {
                let advanced = clock.advanced.notified();
                if clock.now() >= deadline {
                    return;
                }
                advanced.await;
            }
        }
        .boxed()
    }
}

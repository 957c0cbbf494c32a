//! Clocks and the engine runner.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::Engine;

/// Clock interface for driving an engine.
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock started.
    fn now(&self) -> Duration;

    /// Sleep until the given deadline.
    fn sleep_until(&self, deadline: Duration);

    /// Wake any sleepers (best-effort).
    fn wake(&self) {}
}

/// Monotonic clock based on `std::time::Instant`.
#[derive(Debug, Clone)]
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    sleep_calls: u64,
}

/// Deterministic clock for tests and simulations: sleeping jumps straight
/// to the deadline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time by the given delta.
    pub fn advance(&self, delta: Duration) -> Duration {
        let mut state = self.inner.lock();
        state.now = state.now.saturating_add(delta);
        state.now
    }

    /// Set the current time explicitly.
    pub fn set_time(&self, time: Duration) {
        self.inner.lock().now = time;
    }

    /// Number of sleep calls issued to this clock.
    #[must_use]
    pub fn sleep_calls(&self) -> u64 {
        self.inner.lock().sleep_calls
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().now
    }

    fn sleep_until(&self, deadline: Duration) {
        let mut state = self.inner.lock();
        state.sleep_calls = state.sleep_calls.saturating_add(1);
        state.now = state.now.max(deadline);
    }
}

/// Drives an engine in step with a clock.
///
/// The engine's logical time follows the schedule exactly; the clock only
/// decides how long to wait between events.
pub struct Runner<C: Clock> {
    engine: Engine,
    clock: C,
    origin: Duration,
    stop: Arc<AtomicBool>,
}

impl<C: Clock> Runner<C> {
    pub fn new(engine: Engine, clock: C) -> Self {
        let origin = clock.now().saturating_sub(engine.now());
        Self {
            engine,
            clock,
            origin,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends [`Runner::run_until_stopped`] when set.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    #[must_use]
    pub fn into_engine(self) -> Engine {
        self.engine
    }

    /// Processes the next scheduled event, waiting for it first.
    fn advance_one(&mut self) {
        let due = self.engine.next_event_time();
        self.clock.sleep_until(self.origin + due);
        self.engine.advance_to(due);
    }

    /// Runs until `cycles` more script passes have completed.
    pub fn run_cycles(&mut self, cycles: u64) {
        let target = self.engine.ticks().saturating_add(cycles);
        while self.engine.ticks() < target && !self.stop.load(Ordering::SeqCst) {
            self.advance_one();
        }
        debug!(ticks = self.engine.ticks(), "runner finished cycles");
    }

    /// Runs until the stop flag is raised.
    pub fn run_until_stopped(&mut self) {
        while !self.stop.load(Ordering::SeqCst) {
            self.advance_one();
        }
        self.clock.wake();
    }
}

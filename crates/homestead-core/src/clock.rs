//! Tick counting and wall-clock pacing for the Homestead scheduler.
//!
//! The colony's `tick` field is the single source of truth for simulated
//! time. This module owns the two rules around it:
//!
//! - [`next_tick`] advances the counter with checked arithmetic.
//! - [`TickPacer`] decides how long the runner sleeps between ticks so the
//!   loop holds its configured interval on average.
//!
//! # Pacing
//!
//! After every tick the runner asks the pacer for a sleep duration. The
//! pacer subtracts the time the tick itself took, plus however much the
//! previous sleep overshot, from the configured interval. The result is
//! floored at zero: a slow tick delays the next one, it never causes a tick
//! to be skipped or run twice to catch up.

use std::time::Duration;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// The tick after `tick`.
///
/// # Errors
///
/// Returns [`ClockError::TickOverflow`] if `tick` is `u64::MAX`.
pub const fn next_tick(tick: u64) -> Result<u64, ClockError> {
    match tick.checked_add(1) {
        Some(next) => Ok(next),
        None => Err(ClockError::TickOverflow),
    }
}

/// Drift-compensating sleep planner for the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPacer {
    /// Target wall-clock time per tick.
    interval: Duration,
    /// How far the last sleep ran past its plan, capped at one interval.
    drift: Duration,
}

impl TickPacer {
    /// Create a pacer targeting `interval_ms` milliseconds per tick.
    ///
    /// An interval of zero runs ticks back to back.
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            drift: Duration::ZERO,
        }
    }

    /// The configured interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Accumulated oversleep carried into the next plan.
    pub const fn drift(&self) -> Duration {
        self.drift
    }

    /// How long to sleep after a tick whose work took `work`.
    pub const fn plan(&self, work: Duration) -> Duration {
        self.interval.saturating_sub(work.saturating_add(self.drift))
    }

    /// Plan the sleep after a tick. When no sleep fits, the carried drift
    /// has been absorbed by the overrun and is dropped.
    pub fn plan_next(&mut self, work: Duration) -> Duration {
        let planned = self.plan(work);
        if planned.is_zero() {
            self.drift = Duration::ZERO;
        }
        planned
    }

    /// Record how long a sleep of `planned` actually took.
    ///
    /// Only oversleep is carried forward; an early wake resets the drift.
    pub fn record_sleep(&mut self, planned: Duration, actual: Duration) {
        self.drift = actual.saturating_sub(planned).min(self.interval);
    }
}

impl Default for TickPacer {
    fn default() -> Self {
        Self::new(50)
    }
}

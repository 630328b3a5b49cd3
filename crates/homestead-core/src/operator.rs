//! Operator control shared between the tick loop and whoever may stop it.
//!
//! The engine hands a clone of the [`StopHandle`] to its Ctrl-C handler;
//! the runner checks it before every tick. A stop therefore always lands
//! between ticks, never inside one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// A stop was requested through a [`StopHandle`].
    StopRequested,
}

/// Cloneable flag asking the runner to stop after the current tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop_requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create a handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the runner to stop. Idempotent.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

//! Render hooks that report colony changes through `tracing`.
//!
//! The engine has no screen, so "rendering" means structured log lines:
//! worker positions and dirty tiles at `debug`, and a periodic colony
//! summary at `info`.

use tracing::{debug, info};

use homestead_agents::{Colony, DirtySet};
use homestead_core::runner::RenderHooks;
use homestead_core::tick::TickSummary;

/// Hooks that log what the renderer would have redrawn.
pub struct LogHooks {
    /// Emit an `info` summary every this many ticks (0 = never).
    report_every: u64,
    /// Completed or cancelled worker steps since the last summary.
    finished_since_report: u32,
    cancelled_since_report: u32,
}

impl LogHooks {
    /// Create hooks that summarize every `report_every` ticks.
    pub const fn new(report_every: u64) -> Self {
        Self {
            report_every,
            finished_since_report: 0,
            cancelled_since_report: 0,
        }
    }
}

impl RenderHooks for LogHooks {
    fn workers_changed(&mut self, colony: &Colony) {
        for worker in &colony.workers {
            debug!(
                tick = colony.tick,
                worker = %worker.id,
                position = %worker.position,
                carrying = worker.inventory.len(),
                stack = worker.tasks.len(),
                "Worker"
            );
        }
    }

    fn tiles_changed(&mut self, colony: &Colony, dirty: &DirtySet) {
        for coord in &dirty.tiles {
            let items = colony.world.get(*coord).map_or(0, |tile| tile.items.len());
            debug!(tick = colony.tick, tile = %coord, items, "Tile changed");
        }
        for id in &dirty.buildings {
            if let Some(building) = colony.building(*id) {
                debug!(
                    tick = colony.tick,
                    building = %id,
                    template = building.template(),
                    active_tasks = building.active_tasks.len(),
                    "Building changed"
                );
            }
        }
    }

    fn on_tick(&mut self, summary: &TickSummary) {
        self.finished_since_report = self
            .finished_since_report
            .saturating_add(summary.outcomes.completed);
        self.cancelled_since_report = self
            .cancelled_since_report
            .saturating_add(summary.outcomes.cancelled);

        let due = self.report_every > 0
            && summary.tick.checked_rem(self.report_every) == Some(0);
        if due {
            info!(
                tick = summary.tick,
                live_tasks = summary.live_tasks,
                idle = summary.outcomes.idle,
                finished = self.finished_since_report,
                cancelled = self.cancelled_since_report,
                "Colony report"
            );
            self.finished_since_report = 0;
            self.cancelled_since_report = 0;
        }
    }
}

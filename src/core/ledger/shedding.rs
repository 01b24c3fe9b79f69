//! Per-pool queue-depth load shedding with a hysteresis band.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ShedConfig;
use crate::util::serde::Priority;

/// Depth and shedding flag for one pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShedState {
    /// Last known queue depth.
    pub depth: u64,
    /// Whether low/normal work is currently refused.
    pub shedding: bool,
}

impl ShedState {
    /// Start above the upper threshold, stop at or below the lower one; in
    /// between, keep doing whatever we were doing.
    fn settle(&mut self, cfg: &ShedConfig) {
        if self.depth > cfg.queue_depth_threshold {
            self.shedding = true;
        } else if self.depth <= cfg.queue_recovery_threshold {
            self.shedding = false;
        }
    }
}

/// Shedding state for every pool.
#[derive(Debug)]
pub struct LoadShedder {
    cfg: ShedConfig,
    pools: Mutex<HashMap<String, ShedState>>,
}

impl LoadShedder {
    /// New shedder with no observations.
    #[must_use]
    pub fn new(cfg: ShedConfig) -> Self {
        Self {
            cfg,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Record an authoritative depth reading.
    pub fn observe(&self, pool: &str, depth: u64) -> ShedState {
        let mut pools = self.pools.lock();
        let state = pools.entry(pool.to_string()).or_default();
        let was = state.shedding;
        state.depth = depth;
        state.settle(&self.cfg);
        if state.shedding != was {
            tracing::warn!(pool, depth, shedding = state.shedding, "load shedding toggled");
        }
        *state
    }

    /// Bump the depth after a successful enqueue.
    pub fn record_enqueued(&self, pool: &str) -> ShedState {
        let mut pools = self.pools.lock();
        let state = pools.entry(pool.to_string()).or_default();
        state.depth = state.depth.saturating_add(1);
        state.settle(&self.cfg);
        *state
    }

    /// `Err(depth)` when a job of `priority` must be shed from `pool`.
    /// High priority always passes.
    pub fn check(&self, pool: &str, priority: Priority) -> Result<(), u64> {
        if priority == Priority::High {
            return Ok(());
        }
        let state = self.state(pool);
        if state.shedding {
            Err(state.depth)
        } else {
            Ok(())
        }
    }

    /// State of one pool; unobserved pools report zero depth.
    #[must_use]
    pub fn state(&self, pool: &str) -> ShedState {
        self.pools.lock().get(pool).copied().unwrap_or_default()
    }

    /// Copy of every pool's state.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ShedState> {
        self.pools.lock().clone()
    }

    /// Forget a pool that left the catalog.
    pub fn forget(&self, pool: &str) {
        self.pools.lock().remove(pool);
    }
}

//! Autoscaler control loop: turns queue depth into desired-replica intents.
//!
//! The loop runs on its own schedule and only reads signals (queue depth, CPU
//! utilization). It publishes intents into an [`AutoscaleTable`]; provisioning
//! tooling reads the table. Nothing on the admission path waits on it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::AutoscalePolicy;
use crate::core::catalog::{PoolCatalog, SharedCatalog};
use crate::core::dispatcher::QueueDispatcher;
use crate::core::ledger::LimitLedger;
use crate::core::ports::{Spawn, UtilizationSource};
use crate::util::clock::Clock;

/// Where a pool's scaling state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalePhase {
    /// No cooldown pending.
    Stable,
    /// Scaled up; waiting out the up cooldown.
    ScalingUp,
    /// Scaled down; waiting out the down cooldown.
    ScalingDown,
}

/// What one tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ScaleAction {
    /// Desired matches current, or a cooldown blocked the change.
    Hold,
    /// Replica target raised.
    Up {
        /// Previous target.
        from: u32,
        /// New target.
        to: u32,
    },
    /// Replica target lowered.
    Down {
        /// Previous target.
        from: u32,
        /// New target.
        to: u32,
    },
}

/// Signals read for one pool on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolSample {
    /// Jobs waiting.
    pub queue_depth: u64,
    /// Mean worker CPU utilization, when reported.
    pub cpu_utilization: Option<f64>,
}

/// Outcome of evaluating one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleIntent {
    /// Pool evaluated.
    pub pool: String,
    /// Replicas the formula asked for.
    pub computed: u32,
    /// Applied change, if any.
    pub action: ScaleAction,
    /// Signals the decision used.
    pub sample: PoolSample,
    /// Evaluation time.
    pub at_ms: u64,
}

/// Desired-replica state for one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscaleTarget {
    /// Pool name.
    pub pool: String,
    /// Replica count provisioning should converge to.
    pub desired_replicas: u32,
    /// Last applied scale-up.
    pub last_scale_up_ms: Option<u64>,
    /// Last applied scale-down.
    pub last_scale_down_ms: Option<u64>,
    /// Bounds and targets.
    pub policy: AutoscalePolicy,
    /// State machine position.
    pub phase: ScalePhase,
    /// Most recent signals.
    pub last_sample: Option<PoolSample>,
}

/// `max(min, ceil(depth / per_worker))`, clamped to `[min, max]`.
#[must_use]
pub fn desired_replicas(policy: &AutoscalePolicy, queue_depth: u64) -> u32 {
    let per_worker = u64::from(policy.target_queue_depth_per_worker.max(1));
    let needed = queue_depth.div_ceil(per_worker);
    let needed = u32::try_from(needed).unwrap_or(u32::MAX);
    needed
        .max(policy.min_replicas)
        .clamp(policy.min_replicas, policy.max_replicas)
}

impl AutoscaleTarget {
    /// Fresh target starting at `min_replicas`.
    #[must_use]
    pub fn new(pool: impl Into<String>, policy: AutoscalePolicy) -> Self {
        Self {
            pool: pool.into(),
            desired_replicas: policy.min_replicas,
            last_scale_up_ms: None,
            last_scale_down_ms: None,
            policy,
            phase: ScalePhase::Stable,
            last_sample: None,
        }
    }

    fn cooled(last: Option<u64>, cooldown_secs: u64, now_ms: u64) -> bool {
        last.is_none_or(|at| now_ms.saturating_sub(at) >= cooldown_secs.saturating_mul(1000))
    }

    /// Apply one tick's sample.
    pub fn evaluate(&mut self, sample: PoolSample, now_ms: u64) -> ScaleIntent {
        let up_ready = Self::cooled(self.last_scale_up_ms, self.policy.scale_up_cooldown_secs, now_ms);
        let down_ready = Self::cooled(
            self.last_scale_down_ms,
            self.policy.scale_down_cooldown_secs,
            now_ms,
        );
        match self.phase {
            ScalePhase::ScalingUp if up_ready => self.phase = ScalePhase::Stable,
            ScalePhase::ScalingDown if down_ready => self.phase = ScalePhase::Stable,
            _ => {}
        }

        let current = self.desired_replicas;
        let computed = desired_replicas(&self.policy, sample.queue_depth);
        let action = if computed > current && up_ready {
            self.desired_replicas = computed;
            self.last_scale_up_ms = Some(now_ms);
            self.phase = ScalePhase::ScalingUp;
            ScaleAction::Up {
                from: current,
                to: computed,
            }
        } else if computed < current && down_ready {
            self.desired_replicas = computed;
            self.last_scale_down_ms = Some(now_ms);
            self.phase = ScalePhase::ScalingDown;
            ScaleAction::Down {
                from: current,
                to: computed,
            }
        } else {
            ScaleAction::Hold
        };
        self.last_sample = Some(sample);

        ScaleIntent {
            pool: self.pool.clone(),
            computed,
            action,
            sample,
            at_ms: now_ms,
        }
    }
}

/// Per-pool targets. Written only by the autoscaler; read by anyone.
#[derive(Debug, Default)]
pub struct AutoscaleTable {
    targets: RwLock<HashMap<String, AutoscaleTarget>>,
}

impl AutoscaleTable {
    /// Table with one target per catalog pool.
    #[must_use]
    pub fn from_catalog(catalog: &PoolCatalog) -> Self {
        let table = Self::default();
        table.sync_with_catalog(catalog);
        table
    }

    /// Add targets for new pools, refresh bounds of existing ones, drop removed ones.
    pub fn sync_with_catalog(&self, catalog: &PoolCatalog) {
        let mut targets = self.targets.write();
        let mut live = Vec::new();
        for pool in catalog.pools() {
            let Ok(policy) = catalog.autoscale_policy(&pool.name) else {
                continue;
            };
            live.push(pool.name.clone());
            targets
                .entry(pool.name.clone())
                .and_modify(|t| {
                    t.policy = policy.clone();
                    t.desired_replicas = t
                        .desired_replicas
                        .clamp(policy.min_replicas, policy.max_replicas);
                })
                .or_insert_with(|| AutoscaleTarget::new(pool.name.clone(), policy.clone()));
        }
        targets.retain(|name, _| live.contains(name));
    }

    /// Evaluate one pool; `None` if the pool has no target.
    pub fn evaluate(&self, pool: &str, sample: PoolSample, now_ms: u64) -> Option<ScaleIntent> {
        self.targets
            .write()
            .get_mut(pool)
            .map(|t| t.evaluate(sample, now_ms))
    }

    /// Copy of one target.
    #[must_use]
    pub fn get(&self, pool: &str) -> Option<AutoscaleTarget> {
        self.targets.read().get(pool).cloned()
    }

    /// Copy of every target, sorted by pool name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AutoscaleTarget> {
        let mut all: Vec<_> = self.targets.read().values().cloned().collect();
        all.sort_by(|a, b| a.pool.cmp(&b.pool));
        all
    }
}

/// The periodic control loop.
pub struct AutoscalerLoop {
    catalog: Arc<SharedCatalog>,
    dispatcher: Arc<QueueDispatcher>,
    utilization: Arc<dyn UtilizationSource>,
    ledger: Arc<LimitLedger>,
    table: Arc<AutoscaleTable>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl AutoscalerLoop {
    /// Wire the loop to its signal sources and its output table.
    #[must_use]
    pub fn new(
        catalog: Arc<SharedCatalog>,
        dispatcher: Arc<QueueDispatcher>,
        utilization: Arc<dyn UtilizationSource>,
        ledger: Arc<LimitLedger>,
        table: Arc<AutoscaleTable>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            catalog,
            dispatcher,
            utilization,
            ledger,
            table,
            clock,
            interval,
        }
    }

    /// Output table.
    #[must_use]
    pub fn table(&self) -> Arc<AutoscaleTable> {
        Arc::clone(&self.table)
    }

    /// Sample and evaluate one pool. A failed depth read skips the pool for
    /// this tick.
    pub async fn tick_pool(&self, pool: &str) -> Option<ScaleIntent> {
        let queue_depth = match self.dispatcher.queue_depth(pool).await {
            Ok(depth) => depth,
            Err(err) => {
                tracing::warn!(pool, error = %err, "queue depth unavailable; skipping tick");
                return None;
            }
        };
        self.ledger.observe_queue_depth(pool, queue_depth);
        let cpu_utilization = self.utilization.cpu_utilization(pool).await;
        let sample = PoolSample {
            queue_depth,
            cpu_utilization,
        };
        let intent = self.table.evaluate(pool, sample, self.clock.now_ms())?;
        match intent.action {
            ScaleAction::Hold => tracing::debug!(pool, computed = intent.computed, "autoscale hold"),
            ScaleAction::Up { from, to } => {
                tracing::info!(pool, from, to, queue_depth, "autoscale up");
            }
            ScaleAction::Down { from, to } => {
                tracing::info!(pool, from, to, queue_depth, "autoscale down");
            }
        }
        Some(intent)
    }

    /// One pass over every pool in the current catalog.
    pub async fn tick(&self) -> Vec<ScaleIntent> {
        let catalog = self.catalog.snapshot();
        self.table.sync_with_catalog(&catalog);
        let mut intents = Vec::new();
        for pool in catalog.pools() {
            if let Some(intent) = self.tick_pool(&pool.name).await {
                intents.push(intent);
            }
        }
        let pruned = self.ledger.prune_idle_buckets(self.clock.now_ms());
        if pruned > 0 {
            tracing::debug!(pruned, "pruned idle rate buckets");
        }
        intents
    }

    /// Tick every `interval` until `shutdown` flips to `true` or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("autoscaler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run the loop in the background on `spawner`.
    pub fn spawn<S: Spawn>(self: Arc<Self>, spawner: &S, shutdown: watch::Receiver<bool>) {
        spawner.spawn(self.run(shutdown));
    }
}

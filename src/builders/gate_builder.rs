//! Wire catalog, ledger, router, dispatcher and autoscaler from a [`GateConfig`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::GateConfig;
use crate::core::{
    AdmissionController, AuditDrain, AuditSink, AutoscaleTable, AutoscalerLoop, Broker,
    CatalogError, DecisionReporter, LimitLedger, PoolCatalog, QueueDispatcher, Router,
    SharedCatalog, Spawn, SubmissionStore, UtilizationSource,
};
use crate::util::clock::Clock;

/// External collaborators the gate is built around.
pub struct GateParts {
    /// Work queue broker.
    pub broker: Arc<dyn Broker>,
    /// Optional durable submission record.
    pub store: Option<Arc<dyn SubmissionStore>>,
    /// Fleet CPU utilization.
    pub utilization: Arc<dyn UtilizationSource>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Destination for decision records. With `None`, records stay buffered
    /// until the caller drains the controller's reporter itself.
    pub audit: Option<Box<dyn AuditSink>>,
}

/// The assembled admission layer.
pub struct AdmissionGate {
    controller: Arc<AdmissionController>,
    autoscaler: Arc<AutoscalerLoop>,
    catalog: Arc<SharedCatalog>,
    ledger: Arc<LimitLedger>,
    table: Arc<AutoscaleTable>,
    audit: Mutex<Option<AuditDrain>>,
}

impl AdmissionGate {
    /// Submission entry point.
    #[must_use]
    pub fn controller(&self) -> Arc<AdmissionController> {
        Arc::clone(&self.controller)
    }

    /// Autoscaler control loop.
    #[must_use]
    pub fn autoscaler(&self) -> Arc<AutoscalerLoop> {
        Arc::clone(&self.autoscaler)
    }

    /// Hot-reloadable catalog handle.
    #[must_use]
    pub fn catalog(&self) -> Arc<SharedCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Shared limit ledger.
    #[must_use]
    pub fn ledger(&self) -> Arc<LimitLedger> {
        Arc::clone(&self.ledger)
    }

    /// Desired-replica table.
    #[must_use]
    pub fn table(&self) -> Arc<AutoscaleTable> {
        Arc::clone(&self.table)
    }

    /// Swap in the pools from `cfg`. Limits, rate and shedding settings keep
    /// their startup values; only the catalog changes.
    pub fn reload(&self, cfg: &GateConfig) -> Result<Arc<PoolCatalog>, CatalogError> {
        let before: HashSet<String> = self
            .catalog
            .snapshot()
            .pools()
            .map(|p| p.name.clone())
            .collect();
        let fresh = self.catalog.reload(cfg)?;
        self.table.sync_with_catalog(&fresh);
        for removed in before
            .iter()
            .filter(|name| fresh.describe(name).is_err())
        {
            self.ledger.forget_pool(removed);
            tracing::info!(pool = %removed, "pool removed by reload");
        }
        Ok(fresh)
    }

    /// Start the background loops: the autoscaler, which also refreshes queue
    /// depth for load shedding, and the audit drain when a sink was supplied.
    /// Send `true` (or drop the sender) to stop them. The drain starts at most
    /// once per gate.
    pub fn start_background<S: Spawn>(&self, spawner: &S) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        Arc::clone(&self.autoscaler).spawn(spawner, rx.clone());
        let drain = self.audit.lock().take();
        if let Some(drain) = drain {
            drain.spawn(spawner, rx);
        }
        tx
    }
}

/// Validate `cfg` and assemble every component around `parts`.
pub fn build_gate(cfg: &GateConfig, parts: GateParts) -> Result<AdmissionGate, CatalogError> {
    let catalog = Arc::new(SharedCatalog::new(PoolCatalog::from_config(cfg, 0)?));
    let ledger = Arc::new(LimitLedger::new(
        cfg.limits.clone(),
        &cfg.rate_limits,
        cfg.shedding,
    ));
    let dispatcher = Arc::new(QueueDispatcher::new(
        parts.broker,
        Arc::clone(&ledger),
        Arc::clone(&parts.clock),
        Duration::from_millis(cfg.dispatch.broker_timeout_ms),
    ));
    let reporter = Arc::new(DecisionReporter::new(cfg.decision_buffer));
    let table = Arc::new(AutoscaleTable::from_catalog(&catalog.snapshot()));
    let audit = parts
        .audit
        .map(|sink| AuditDrain::new(Arc::clone(&reporter), sink));

    let controller = Arc::new(AdmissionController::new(
        Arc::clone(&catalog),
        Arc::clone(&ledger),
        Router::new(cfg.router),
        Arc::clone(&dispatcher),
        reporter,
        parts.store,
        cfg.hard_caps.clone(),
        Arc::clone(&parts.clock),
    ));
    let autoscaler = Arc::new(AutoscalerLoop::new(
        Arc::clone(&catalog),
        dispatcher,
        parts.utilization,
        Arc::clone(&ledger),
        Arc::clone(&table),
        parts.clock,
        Duration::from_millis(cfg.autoscaler.tick_interval_ms),
    ));

    tracing::info!(
        pools = catalog.snapshot().pools().count(),
        "admission gate assembled"
    );
    Ok(AdmissionGate {
        controller,
        autoscaler,
        catalog,
        ledger,
        table,
        audit: Mutex::new(audit),
    })
}

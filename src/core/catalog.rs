//! Pool catalog: the immutable table of execution pools, plus an atomically
//! swappable handle for hot reload.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::{AutoscalePolicy, GateConfig, LanguageSet, PoolConfig};
use crate::core::CatalogError;
use crate::util::serde::{IsolationTier, ResourceRequest};

/// Capability envelope of one execution pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDescriptor {
    /// Unique name.
    pub name: String,
    /// Accepted languages.
    pub languages: LanguageSet,
    /// Memory ceiling (MB).
    pub max_memory_mb: u32,
    /// CPU ceiling (cores).
    pub max_cpu_cores: f64,
    /// Timeout ceiling (seconds).
    pub max_timeout_secs: u32,
    /// Jobs the pool runs at once.
    pub max_concurrent_jobs: u32,
    /// Sandbox strength.
    pub isolation: IsolationTier,
    /// Lower wins.
    pub priority: u32,
}

impl PoolDescriptor {
    /// True when every requested resource fits under this pool's ceilings.
    #[must_use]
    pub fn fits(&self, request: &ResourceRequest) -> bool {
        request.memory_mb <= self.max_memory_mb
            && request.cpu_cores <= self.max_cpu_cores
            && request.timeout_secs <= self.max_timeout_secs
    }

    /// Priority first, name second. Total and deterministic.
    #[must_use]
    pub fn selection_order(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl From<&PoolConfig> for PoolDescriptor {
    fn from(cfg: &PoolConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            languages: cfg.languages.clone(),
            max_memory_mb: cfg.max_memory_mb,
            max_cpu_cores: cfg.max_cpu_cores,
            max_timeout_secs: cfg.max_timeout_secs,
            max_concurrent_jobs: cfg.max_concurrent_jobs,
            isolation: cfg.isolation,
            priority: cfg.priority,
        }
    }
}

/// Worker sizing for one pool.
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    /// Owning pool.
    pub pool: String,
    /// Jobs per worker instance.
    pub max_concurrent_jobs: u32,
    /// Memory reserved per job (MB).
    pub memory_per_job_mb: u32,
    /// CPU reserved per job.
    pub cpu_per_job: f64,
    /// Timeout when the submission gives none.
    pub default_timeout: Duration,
    /// Health-check cadence.
    pub health_check_interval: Duration,
    /// Drain budget on shutdown.
    pub graceful_shutdown: Duration,
}

impl From<&PoolConfig> for WorkerPolicy {
    fn from(cfg: &PoolConfig) -> Self {
        let w = &cfg.worker;
        Self {
            pool: cfg.name.clone(),
            max_concurrent_jobs: w.max_concurrent_jobs,
            memory_per_job_mb: w.memory_per_job_mb,
            cpu_per_job: w.cpu_per_job,
            default_timeout: Duration::from_secs(u64::from(w.default_timeout_secs)),
            health_check_interval: Duration::from_secs(u64::from(w.health_check_interval_secs)),
            graceful_shutdown: Duration::from_secs(u64::from(w.graceful_shutdown_secs)),
        }
    }
}

/// The strongest tier, if the catalog actually mixes tiers. A catalog with a
/// single tier has no elevated pool.
pub fn elevated_tier(tiers: impl IntoIterator<Item = IsolationTier>) -> Option<IsolationTier> {
    let mut iter = tiers.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(lo, hi), t| {
        (
            if t.strength() < lo.strength() { t } else { lo },
            if t.strength() > hi.strength() { t } else { hi },
        )
    });
    (max != min).then_some(max)
}

/// Immutable pool table. One instance per process generation.
#[derive(Debug)]
pub struct PoolCatalog {
    generation: u64,
    /// Sorted by `selection_order`.
    pools: Vec<PoolDescriptor>,
    by_name: HashMap<String, usize>,
    policies: HashMap<String, WorkerPolicy>,
    autoscale: HashMap<String, AutoscalePolicy>,
    elevated_tier: Option<IsolationTier>,
}

impl PoolCatalog {
    /// Build a catalog from validated configuration.
    pub fn from_config(cfg: &GateConfig, generation: u64) -> Result<Self, CatalogError> {
        cfg.validate().map_err(CatalogError::Invalid)?;

        let mut pools: Vec<PoolDescriptor> = cfg.pools.iter().map(PoolDescriptor::from).collect();
        pools.sort_by(PoolDescriptor::selection_order);
        let by_name = pools
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.name.clone(), idx))
            .collect();
        let policies = cfg
            .pools
            .iter()
            .map(|p| (p.name.clone(), WorkerPolicy::from(p)))
            .collect();
        let autoscale = cfg
            .pools
            .iter()
            .map(|p| (p.name.clone(), p.autoscale.clone()))
            .collect();
        let elevated_tier = elevated_tier(pools.iter().map(|p| p.isolation));

        Ok(Self {
            generation,
            pools,
            by_name,
            policies,
            autoscale,
            elevated_tier,
        })
    }

    /// Generation counter of this table.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up a pool by name.
    pub fn describe(&self, pool: &str) -> Result<&PoolDescriptor, CatalogError> {
        self.by_name
            .get(pool)
            .map(|&idx| &self.pools[idx])
            .ok_or_else(|| CatalogError::UnknownPool(pool.to_string()))
    }

    /// Pools supporting `language` (or wildcard), ascending priority.
    #[must_use]
    pub fn list_candidates(&self, language: &str) -> Vec<&PoolDescriptor> {
        self.pools
            .iter()
            .filter(|p| p.languages.supports(language))
            .collect()
    }

    /// Every pool, ascending priority.
    pub fn pools(&self) -> impl Iterator<Item = &PoolDescriptor> {
        self.pools.iter()
    }

    /// Whether `pool` sits at the elevated isolation tier.
    #[must_use]
    pub fn is_elevated(&self, pool: &PoolDescriptor) -> bool {
        self.elevated_tier == Some(pool.isolation)
    }

    /// The pool trust overrides route to: strongest tier, then priority, then name.
    #[must_use]
    pub fn elevated_pool(&self) -> Option<&PoolDescriptor> {
        let tier = self.elevated_tier?;
        self.pools.iter().find(|p| p.isolation == tier)
    }

    /// Worker sizing for `pool`.
    pub fn worker_policy(&self, pool: &str) -> Result<&WorkerPolicy, CatalogError> {
        self.policies
            .get(pool)
            .ok_or_else(|| CatalogError::UnknownPool(pool.to_string()))
    }

    /// Autoscale bounds for `pool`.
    pub fn autoscale_policy(&self, pool: &str) -> Result<&AutoscalePolicy, CatalogError> {
        self.autoscale
            .get(pool)
            .ok_or_else(|| CatalogError::UnknownPool(pool.to_string()))
    }
}

/// Shared, hot-reloadable catalog handle. Readers take an `Arc` snapshot and
/// never see a half-updated table.
#[derive(Debug)]
pub struct SharedCatalog {
    current: RwLock<Arc<PoolCatalog>>,
    next_generation: AtomicU64,
}

impl SharedCatalog {
    /// Wrap an initial catalog.
    #[must_use]
    pub fn new(catalog: PoolCatalog) -> Self {
        let next = catalog.generation() + 1;
        Self {
            current: RwLock::new(Arc::new(catalog)),
            next_generation: AtomicU64::new(next),
        }
    }

    /// Current table. The read lock is held only for an `Arc` clone.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PoolCatalog> {
        Arc::clone(&self.current.read())
    }

    /// Validate `cfg` and swap the whole table in one step.
    pub fn reload(&self, cfg: &GateConfig) -> Result<Arc<PoolCatalog>, CatalogError> {
        let generation = self.next_generation.fetch_add(1, AtomicOrdering::AcqRel);
        let fresh = Arc::new(PoolCatalog::from_config(cfg, generation)?);
        *self.current.write() = Arc::clone(&fresh);
        tracing::info!(generation, pools = fresh.pools.len(), "pool catalog reloaded");
        Ok(fresh)
    }
}

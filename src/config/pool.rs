//! Per-pool configuration: capability envelope, worker policy and autoscale bounds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::util::serde::IsolationTier;

/// Wildcard entry accepted in a pool's language list.
pub const WILDCARD_LANGUAGE: &str = "*";

/// Languages a pool accepts. Serialized as a list where `"*"` means all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum LanguageSet {
    /// Every language.
    Any,
    /// Explicit lowercase language names.
    Only(BTreeSet<String>),
}

impl LanguageSet {
    /// Case-insensitive membership test. `Any` matches everything.
    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(set) => set.contains(&language.to_ascii_lowercase()),
        }
    }

    /// True for the wildcard set.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl From<Vec<String>> for LanguageSet {
    fn from(list: Vec<String>) -> Self {
        if list.iter().any(|l| l == WILDCARD_LANGUAGE) {
            return Self::Any;
        }
        Self::Only(list.iter().map(|l| l.trim().to_ascii_lowercase()).collect())
    }
}

impl From<LanguageSet> for Vec<String> {
    fn from(set: LanguageSet) -> Self {
        match set {
            LanguageSet::Any => vec![WILDCARD_LANGUAGE.to_string()],
            LanguageSet::Only(set) => set.into_iter().collect(),
        }
    }
}

/// Worker sizing for a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPolicyConfig {
    /// Jobs one worker instance runs at once.
    pub max_concurrent_jobs: u32,
    /// Memory reserved per job (MB).
    pub memory_per_job_mb: u32,
    /// CPU reserved per job (cores).
    pub cpu_per_job: f64,
    /// Timeout applied when a submission does not ask for one.
    pub default_timeout_secs: u32,
    /// Health-check cadence.
    pub health_check_interval_secs: u32,
    /// Budget for draining a worker on shutdown.
    pub graceful_shutdown_secs: u32,
    /// Memory budget of the node a worker runs on (MB).
    pub node_memory_mb: u32,
}

impl Default for WorkerPolicyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            memory_per_job_mb: 256,
            cpu_per_job: 0.5,
            default_timeout_secs: 10,
            health_check_interval_secs: 15,
            graceful_shutdown_secs: 30,
            node_memory_mb: 2048,
        }
    }
}

/// Replica bounds and targets for the pool's autoscaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalePolicy {
    /// Lower replica bound.
    pub min_replicas: u32,
    /// Upper replica bound.
    pub max_replicas: u32,
    /// Queue depth one worker is expected to absorb.
    pub target_queue_depth_per_worker: u32,
    /// Target average CPU utilization in `0.0..=1.0`.
    pub target_cpu_utilization: f64,
    /// Minimum spacing between scale-ups.
    pub scale_up_cooldown_secs: u64,
    /// Minimum spacing between scale-downs.
    pub scale_down_cooldown_secs: u64,
}

impl Default for AutoscalePolicy {
    fn default() -> Self {
        Self {
            min_replicas: 1,
            max_replicas: 10,
            target_queue_depth_per_worker: 10,
            target_cpu_utilization: 0.7,
            scale_up_cooldown_secs: 30,
            scale_down_cooldown_secs: 300,
        }
    }
}

impl AutoscalePolicy {
    /// Validate replica bounds and targets.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_replicas == 0 {
            return Err("max_replicas must be greater than 0".into());
        }
        if self.min_replicas > self.max_replicas {
            return Err(format!(
                "min_replicas ({}) exceeds max_replicas ({})",
                self.min_replicas, self.max_replicas
            ));
        }
        if self.target_queue_depth_per_worker == 0 {
            return Err("target_queue_depth_per_worker must be greater than 0".into());
        }
        if !(self.target_cpu_utilization > 0.0 && self.target_cpu_utilization <= 1.0) {
            return Err("target_cpu_utilization must be in (0, 1]".into());
        }
        Ok(())
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Unique pool name; also the broker queue key.
    pub name: String,
    /// Supported languages (`["*"]` for all).
    pub languages: LanguageSet,
    /// Memory ceiling per job (MB).
    pub max_memory_mb: u32,
    /// CPU ceiling per job (cores).
    pub max_cpu_cores: f64,
    /// Timeout ceiling per job (seconds).
    pub max_timeout_secs: u32,
    /// Jobs the whole pool may run at once.
    pub max_concurrent_jobs: u32,
    /// Isolation tier of the pool's sandbox.
    pub isolation: IsolationTier,
    /// Selection priority; lower wins.
    pub priority: u32,
    /// Worker sizing.
    #[serde(default)]
    pub worker: WorkerPolicyConfig,
    /// Autoscaler bounds.
    #[serde(default)]
    pub autoscale: AutoscalePolicy,
}

impl PoolConfig {
    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if let LanguageSet::Only(set) = &self.languages {
            if set.is_empty() {
                return Err("languages must not be empty".into());
            }
        }
        if self.max_memory_mb == 0 {
            return Err("max_memory_mb must be greater than 0".into());
        }
        if self.max_cpu_cores <= 0.0 || !self.max_cpu_cores.is_finite() {
            return Err("max_cpu_cores must be a positive number".into());
        }
        if self.max_timeout_secs == 0 {
            return Err("max_timeout_secs must be greater than 0".into());
        }
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be greater than 0".into());
        }
        let worker = &self.worker;
        if worker.max_concurrent_jobs == 0 {
            return Err("worker.max_concurrent_jobs must be greater than 0".into());
        }
        if worker.default_timeout_secs == 0 {
            return Err("worker.default_timeout_secs must be greater than 0".into());
        }
        if worker.default_timeout_secs > self.max_timeout_secs {
            return Err("worker.default_timeout_secs exceeds max_timeout_secs".into());
        }
        let reserved = u64::from(worker.memory_per_job_mb) * u64::from(worker.max_concurrent_jobs);
        if reserved > u64::from(worker.node_memory_mb) {
            return Err(format!(
                "worker reserves {reserved} MB ({} MB x {} jobs) but node budget is {} MB",
                worker.memory_per_job_mb, worker.max_concurrent_jobs, worker.node_memory_mb
            ));
        }
        self.autoscale
            .validate()
            .map_err(|e| format!("autoscale: {e}"))
    }
}

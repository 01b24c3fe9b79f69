//! Root configuration and the load-time validation pass.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::limits::{
    AutoscalerConfig, ConcurrencyLimits, DispatchConfig, HardCaps, RateLimitConfig, RouterConfig,
    ShedConfig,
};
use crate::config::pool::PoolConfig;
use crate::core::AppResult;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "ADMISSION_CONFIG";

/// Root configuration for the admission layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Execution pools.
    pub pools: Vec<PoolConfig>,
    /// In-flight ceilings.
    #[serde(default)]
    pub limits: ConcurrencyLimits,
    /// Token buckets.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    /// Load-shedding band.
    #[serde(default)]
    pub shedding: ShedConfig,
    /// Router tuning.
    #[serde(default)]
    pub router: RouterConfig,
    /// Absolute request caps.
    #[serde(default)]
    pub hard_caps: HardCaps,
    /// Broker handoff.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Autoscaler cadence.
    #[serde(default)]
    pub autoscaler: AutoscalerConfig,
    /// Capacity of the decision-record buffer.
    #[serde(default = "default_decision_buffer")]
    pub decision_buffer: usize,
}

const fn default_decision_buffer() -> usize {
    4096
}

impl GateConfig {
    /// Validate every pool plus the cross-pool invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        let mut names = HashSet::new();
        for pool in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{}` invalid: {e}", pool.name))?;
            if !names.insert(pool.name.as_str()) {
                return Err(format!("duplicate pool name `{}`", pool.name));
            }
        }

        let limits = &self.limits;
        if limits.global_max_concurrent == 0
            || limits.per_user_max_concurrent == 0
            || limits.per_problem_max_concurrent == 0
        {
            return Err("concurrency limits must be greater than 0".into());
        }
        self.rate_limits
            .validate()
            .map_err(|e| format!("rate_limits.{e}"))?;
        if self.shedding.queue_recovery_threshold >= self.shedding.queue_depth_threshold {
            return Err(format!(
                "queue_recovery_threshold ({}) must be below queue_depth_threshold ({})",
                self.shedding.queue_recovery_threshold, self.shedding.queue_depth_threshold
            ));
        }
        if self.hard_caps.known_languages.is_empty() {
            return Err("hard_caps.known_languages must not be empty".into());
        }
        if self.dispatch.broker_timeout_ms == 0 {
            return Err("dispatch.broker_timeout_ms must be greater than 0".into());
        }
        if self.autoscaler.tick_interval_ms == 0 {
            return Err("autoscaler.tick_interval_ms must be greater than 0".into());
        }
        if self.decision_buffer == 0 {
            return Err("decision_buffer must be greater than 0".into());
        }

        self.validate_language_coverage()?;
        self.warn_duplicate_priorities();
        Ok(())
    }

    /// Every known language must reach some pool through normal matching, so
    /// elevated-tier pools do not count.
    fn validate_language_coverage(&self) -> Result<(), String> {
        let elevated = crate::core::catalog::elevated_tier(self.pools.iter().map(|p| p.isolation));
        let routable: Vec<&PoolConfig> = self
            .pools
            .iter()
            .filter(|p| Some(p.isolation) != elevated)
            .collect();
        if routable.is_empty() {
            return Err("no pool is reachable for standard submitters".into());
        }
        for language in &self.hard_caps.known_languages {
            if !routable.iter().any(|p| p.languages.supports(language)) {
                return Err(format!("language `{language}` maps to no pool"));
            }
        }
        Ok(())
    }

    fn warn_duplicate_priorities(&self) {
        let mut seen: HashMap<u32, &str> = HashMap::new();
        for pool in &self.pools {
            if let Some(other) = seen.insert(pool.priority, &pool.name) {
                tracing::warn!(
                    priority = pool.priority,
                    first = other,
                    second = %pool.name,
                    "pools share a priority; ties break by name"
                );
            }
        }
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading {}", path.display()))
    }

    /// Load `.env` if present, then read the file named by `ADMISSION_CONFIG`.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_ENV_VAR)
            .with_context(|| format!("{CONFIG_ENV_VAR} is not set"))?;
        Self::from_file(path)
    }
}

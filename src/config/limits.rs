//! Admission limits: concurrency ceilings, token buckets, load shedding and hard caps.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Languages accepted when no explicit list is configured.
pub const DEFAULT_LANGUAGES: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "c",
    "cpp",
    "java",
    "go",
    "rust",
    "ruby",
    "php",
];

/// In-flight ceilings, checked global, then user, then problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyLimits {
    /// Jobs in flight across all tenants.
    pub global_max_concurrent: u32,
    /// Jobs in flight for one user.
    pub per_user_max_concurrent: u32,
    /// Jobs in flight for one problem.
    pub per_problem_max_concurrent: u32,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            global_max_concurrent: 500,
            per_user_max_concurrent: 5,
            per_problem_max_concurrent: 100,
        }
    }
}

/// A single token bucket shape: refill `rate_per_sec`, capacity `rate * burst_multiplier`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Tokens added per second.
    pub rate_per_sec: f64,
    /// Capacity as a multiple of the rate.
    pub burst_multiplier: f64,
}

impl BucketConfig {
    /// Maximum tokens the bucket holds.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.rate_per_sec * self.burst_multiplier
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.rate_per_sec.is_finite() && self.rate_per_sec > 0.0) {
            return Err("rate_per_sec must be a positive number".into());
        }
        if !(self.burst_multiplier.is_finite() && self.burst_multiplier >= 1.0) {
            return Err("burst_multiplier must be at least 1".into());
        }
        Ok(())
    }
}

/// Token buckets for the three scopes checked per submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Per submitting user.
    pub user: BucketConfig,
    /// Per source address.
    pub address: BucketConfig,
    /// One bucket shared by everyone.
    pub global: BucketConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user: BucketConfig {
                rate_per_sec: 2.0,
                burst_multiplier: 5.0,
            },
            address: BucketConfig {
                rate_per_sec: 5.0,
                burst_multiplier: 4.0,
            },
            global: BucketConfig {
                rate_per_sec: 200.0,
                burst_multiplier: 2.0,
            },
        }
    }
}

impl RateLimitConfig {
    /// Validate all three bucket shapes.
    pub fn validate(&self) -> Result<(), String> {
        self.user.validate().map_err(|e| format!("user: {e}"))?;
        self.address.validate().map_err(|e| format!("address: {e}"))?;
        self.global.validate().map_err(|e| format!("global: {e}"))
    }
}

/// Queue-depth hysteresis band for load shedding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ShedConfig {
    /// Above this depth, low and normal jobs are shed.
    pub queue_depth_threshold: u64,
    /// Shedding stops once depth falls to this value.
    pub queue_recovery_threshold: u64,
}

impl Default for ShedConfig {
    fn default() -> Self {
        Self {
            queue_depth_threshold: 1000,
            queue_recovery_threshold: 500,
        }
    }
}

/// Router tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Verified submitters asking for more than this are sent to the elevated pool.
    pub high_resource_memory_mb: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            high_resource_memory_mb: 1024,
        }
    }
}

/// Absolute caps applied during structural validation, independent of any pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardCaps {
    /// Largest memory request accepted at all (MB).
    pub max_memory_mb: u32,
    /// Largest CPU request accepted at all (cores).
    pub max_cpu_cores: f64,
    /// Longest timeout accepted at all (seconds).
    pub max_timeout_secs: u32,
    /// Languages the platform knows about.
    pub known_languages: BTreeSet<String>,
}

impl Default for HardCaps {
    fn default() -> Self {
        Self {
            max_memory_mb: 8192,
            max_cpu_cores: 8.0,
            max_timeout_secs: 300,
            known_languages: DEFAULT_LANGUAGES.iter().map(|l| (*l).to_string()).collect(),
        }
    }
}

impl HardCaps {
    /// Case-insensitive check against the known language list.
    #[must_use]
    pub fn knows(&self, language: &str) -> bool {
        self.known_languages.contains(&language.to_ascii_lowercase())
    }
}

/// Broker handoff tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on one enqueue call.
    pub broker_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            broker_timeout_ms: 2_000,
        }
    }
}

/// Autoscaler loop tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerConfig {
    /// Fixed tick interval.
    pub tick_interval_ms: u64,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
        }
    }
}

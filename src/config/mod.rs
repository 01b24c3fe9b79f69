//! Configuration models for pools, limits, and the autoscaler.

pub mod gate;
pub mod limits;
pub mod pool;

pub use gate::GateConfig;
pub use limits::{
    AutoscalerConfig, BucketConfig, ConcurrencyLimits, DispatchConfig, HardCaps, RateLimitConfig,
    RouterConfig, ShedConfig,
};
pub use pool::{AutoscalePolicy, LanguageSet, PoolConfig, WorkerPolicyConfig};

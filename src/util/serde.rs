//! Shared serializable vocabulary: priorities, trust and isolation tiers, identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to an admitted job.
pub type JobId = String;

/// Generate a fresh job identifier.
#[must_use]
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}

/// Priority class of a job. `High` bypasses load shedding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work, shed first.
    Low,
    /// Default class.
    #[default]
    Normal,
    /// Never shed.
    High,
}

/// Submitter classification. Absent means `Standard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Anonymous or ordinary tenant.
    #[default]
    Standard,
    /// Tenant that passed verification.
    Verified,
    /// Operator.
    Admin,
}

impl TrustTier {
    /// Whether this tier may be matched onto the elevated-isolation pool.
    #[must_use]
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Verified | Self::Admin)
    }
}

/// Strength of the sandbox a pool provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationTier {
    /// Plain OS process with rlimits.
    Process,
    /// Namespaced container.
    Container,
    /// Hardware-virtualized micro VM.
    #[serde(rename = "microvm")]
    MicroVm,
}

impl IsolationTier {
    /// Ordering key: higher is stronger.
    #[must_use]
    pub const fn strength(self) -> u8 {
        match self {
            Self::Process => 0,
            Self::Container => 1,
            Self::MicroVm => 2,
        }
    }
}

impl fmt::Display for IsolationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Process => "process",
            Self::Container => "container",
            Self::MicroVm => "microvm",
        };
        f.write_str(name)
    }
}

/// Memory, CPU and wall-time requested or reserved for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Memory in megabytes.
    pub memory_mb: u32,
    /// CPU cores, fractional allowed.
    pub cpu_cores: f64,
    /// Wall-clock timeout in seconds.
    pub timeout_secs: u32,
}

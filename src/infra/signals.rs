//! Fleet-reported signals consumed by the autoscaler.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::UtilizationSource;

/// Utilization values pushed in by whatever watches the workers.
#[derive(Debug, Default)]
pub struct ReportedUtilization {
    values: RwLock<HashMap<String, f64>>,
}

impl ReportedUtilization {
    /// No pool reported yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest mean CPU utilization for a pool, clamped to `0.0..=1.0`.
    pub fn report(&self, pool: impl Into<String>, utilization: f64) {
        self.values
            .write()
            .insert(pool.into(), utilization.clamp(0.0, 1.0));
    }

    /// Forget a pool's value.
    pub fn clear(&self, pool: &str) {
        self.values.write().remove(pool);
    }
}

#[async_trait]
impl UtilizationSource for ReportedUtilization {
    async fn cpu_utilization(&self, pool: &str) -> Option<f64> {
        self.values.read().get(pool).copied()
    }
}

//! Pool selection. Pure function of a catalog snapshot and a requirement.

use crate::config::RouterConfig;
use crate::core::catalog::{PoolCatalog, PoolDescriptor};
use crate::core::job::SubmissionRequirement;
use crate::core::RouteError;
use crate::util::serde::TrustTier;

/// Chooses exactly one pool per submission.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    cfg: RouterConfig,
}

impl Router {
    /// New router.
    #[must_use]
    pub const fn new(cfg: RouterConfig) -> Self {
        Self { cfg }
    }

    /// Select the pool for `req`.
    ///
    /// Admins always get the elevated pool. Verified submitters asking for more
    /// memory than `high_resource_memory_mb` get it too. Everyone else goes
    /// through matching: language, then ceilings, and the elevated tier only
    /// for verified/admin. Among matches the lowest priority wins, ties broken
    /// by pool name.
    pub fn select_pool<'a>(
        &self,
        catalog: &'a PoolCatalog,
        req: &SubmissionRequirement,
    ) -> Result<&'a PoolDescriptor, RouteError> {
        let trust = req.trust_tier();

        if let Some(elevated) = catalog.elevated_pool() {
            let override_applies = match trust {
                TrustTier::Admin => true,
                TrustTier::Verified => req.memory_mb > self.cfg.high_resource_memory_mb,
                TrustTier::Standard => false,
            };
            if override_applies {
                tracing::debug!(pool = %elevated.name, ?trust, "trust override");
                return Ok(elevated);
            }
        }

        let resources = req.resources();
        catalog
            .list_candidates(&req.language)
            .into_iter()
            .filter(|pool| pool.fits(&resources))
            .filter(|pool| trust.is_elevated() || !catalog.is_elevated(pool))
            .min_by(|a, b| a.selection_order(b))
            .ok_or_else(|| RouteError::NoPoolAvailable {
                language: req.language.clone(),
                memory_mb: req.memory_mb,
                cpu_cores: req.cpu_cores,
                timeout_secs: req.timeout_secs,
            })
    }
}

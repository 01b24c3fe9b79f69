//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{
    AdmissionController, AdmissionError, Admitted, AutoscaleTable, AutoscaleTarget, ObjectStore,
    PoolCatalog, RejectReason, SubmissionRequirement,
};
use crate::util::serde::{IsolationTier, JobId};

/// Outcome of a submission as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResponse {
    /// Job enqueued.
    Accepted {
        /// Submission identifier.
        job_id: JobId,
        /// Pool the job was routed to.
        pool: String,
    },
    /// Submission refused.
    Rejected {
        /// Closed reason code.
        reason: RejectReason,
        /// Human-readable detail.
        detail: String,
        /// Whether retrying with backoff can succeed without changing the request.
        retryable: bool,
    },
}

impl SubmitResponse {
    /// True for [`SubmitResponse::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

impl From<&AdmissionError> for SubmitResponse {
    fn from(err: &AdmissionError) -> Self {
        let reason = err.reason();
        Self::Rejected {
            reason,
            detail: err.to_string(),
            retryable: reason.is_retryable(),
        }
    }
}

impl From<&Admitted> for SubmitResponse {
    fn from(admitted: &Admitted) -> Self {
        Self::Accepted {
            job_id: admitted.job.id.clone(),
            pool: admitted.job.pool.clone(),
        }
    }
}

/// Submission carrying the source code itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSubmission {
    /// Resource and identity requirement.
    #[serde(flatten)]
    pub requirement: SubmissionRequirement,
    /// Source text.
    pub code: String,
}

/// Pool listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool name.
    pub name: String,
    /// Accepted languages; `["*"]` for wildcard pools.
    pub languages: Vec<String>,
    /// Memory ceiling (MB).
    pub max_memory_mb: u32,
    /// CPU ceiling (cores).
    pub max_cpu_cores: f64,
    /// Timeout ceiling (seconds).
    pub max_timeout_secs: u32,
    /// Isolation tier.
    pub isolation: IsolationTier,
    /// Selection priority (lower wins).
    pub priority: u32,
    /// Whether only trusted callers can land here.
    pub elevated: bool,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// False once counter corruption has been detected.
    pub ok: bool,
    /// Catalog generation in use.
    pub catalog_generation: u64,
    /// Jobs currently holding a reservation.
    pub in_flight: u32,
    /// Pools currently shedding normal/low work.
    pub shedding_pools: Vec<String>,
    /// Unbalanced releases seen.
    pub corruption_events: u64,
    /// Decision records dropped because the buffer was full.
    pub dropped_decisions: u64,
}

/// Admit a submission and map the result to a response.
pub async fn submit(controller: &AdmissionController, req: SubmissionRequirement) -> SubmitResponse {
    match controller.submit(req).await {
        Ok(admitted) => SubmitResponse::from(&admitted),
        Err(err) => SubmitResponse::from(&err),
    }
}

/// Upload the source, then admit. An upload failure is surfaced as a
/// retryable dispatch failure; nothing has been reserved at that point.
pub async fn submit_source(
    controller: &AdmissionController,
    objects: &dyn ObjectStore,
    submission: SourceSubmission,
) -> SubmitResponse {
    let req = submission.requirement;
    let metadata = vec![
        ("user_id".to_string(), req.user_id.clone()),
        ("problem_id".to_string(), req.problem_id.clone()),
        ("language".to_string(), req.language.clone()),
    ];
    let key = match objects.upload(submission.code.as_bytes(), &metadata).await {
        Ok(key) => key,
        Err(err) => {
            tracing::error!(user = %req.user_id, error = %err, "source upload failed");
            return SubmitResponse::Rejected {
                reason: RejectReason::DispatchFailed,
                detail: format!("source upload failed: {err}"),
                retryable: RejectReason::DispatchFailed.is_retryable(),
            };
        }
    };
    match controller.submit_with_source(req, Some(key)).await {
        Ok(admitted) => SubmitResponse::from(&admitted),
        Err(err) => SubmitResponse::from(&err),
    }
}

/// Pool listings from a catalog snapshot, in selection order.
#[must_use]
pub fn list_pools(catalog: &PoolCatalog) -> Vec<PoolSnapshot> {
    catalog
        .pools()
        .map(|pool| PoolSnapshot {
            name: pool.name.clone(),
            languages: Vec::from(pool.languages.clone()),
            max_memory_mb: pool.max_memory_mb,
            max_cpu_cores: pool.max_cpu_cores,
            max_timeout_secs: pool.max_timeout_secs,
            isolation: pool.isolation,
            priority: pool.priority,
            elevated: catalog.is_elevated(pool),
        })
        .collect()
}

/// Current autoscale targets, sorted by pool name.
#[must_use]
pub fn autoscale_targets(table: &AutoscaleTable) -> Vec<AutoscaleTarget> {
    table.snapshot()
}

/// Health payload derived from the ledger and decision reporter.
#[must_use]
pub fn health(controller: &AdmissionController) -> Health {
    let ledger = controller.ledger().snapshot();
    let mut shedding_pools: Vec<String> = ledger
        .queues
        .iter()
        .filter(|(_, state)| state.shedding)
        .map(|(pool, _)| pool.clone())
        .collect();
    shedding_pools.sort();
    Health {
        ok: ledger.corruption_events == 0,
        catalog_generation: controller.catalog().snapshot().generation(),
        in_flight: ledger.in_flight.global,
        shedding_pools,
        corruption_events: ledger.corruption_events,
        dropped_decisions: controller.reporter().dropped(),
    }
}

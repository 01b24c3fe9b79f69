//! Admission controller: validation, rate limits, concurrency, routing, load
//! shedding and dispatch, in that order.

use std::sync::Arc;
use std::time::Instant;

use crate::config::HardCaps;
use crate::core::audit::{DecisionRecord, DecisionReporter};
use crate::core::catalog::SharedCatalog;
use crate::core::dispatcher::{EnqueueReceipt, QueueDispatcher};
use crate::core::job::{Job, JobOutcome, SubmissionRequirement, SubmissionStatus};
use crate::core::ledger::LimitLedger;
use crate::core::ports::SubmissionStore;
use crate::core::router::Router;
use crate::core::{AdmissionError, LedgerError};
use crate::util::clock::Clock;
use crate::util::serde::new_job_id;

/// An accepted submission: the job as handed to the broker and the receipt.
#[derive(Debug, Clone)]
pub struct Admitted {
    /// Job record; pass it back to [`AdmissionController::complete`].
    pub job: Job,
    /// Broker receipt.
    pub receipt: EnqueueReceipt,
}

/// One held concurrency slot. Dropping an armed guard releases the slot, so a
/// cancelled submission future cannot leak it.
struct Reservation {
    ledger: Arc<LimitLedger>,
    user: String,
    problem: String,
    armed: bool,
}

impl Reservation {
    fn new(ledger: Arc<LimitLedger>, user: &str, problem: &str) -> Self {
        Self {
            ledger,
            user: user.to_string(),
            problem: problem.to_string(),
            armed: true,
        }
    }

    /// Compensate a later-stage failure.
    fn release(mut self, why: &str) {
        self.armed = false;
        tracing::debug!(user = %self.user, problem = %self.problem, why, "releasing reservation");
        self.give_back(why);
    }

    /// Keep the slot; it is now owned by `job_id` until its terminal outcome.
    fn commit(mut self, job_id: &str) {
        self.armed = false;
        self.ledger.bind_job(job_id);
    }

    fn give_back(&self, why: &str) {
        if let Err(err) = self.ledger.release(&self.user, &self.problem) {
            tracing::error!(
                user = %self.user,
                problem = %self.problem,
                why,
                error = %err,
                "compensating release failed"
            );
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(user = %self.user, problem = %self.problem, "submission abandoned; releasing reservation");
            self.give_back("submission abandoned");
        }
    }
}

/// Orchestrates the admission pipeline for every submission.
pub struct AdmissionController {
    catalog: Arc<SharedCatalog>,
    ledger: Arc<LimitLedger>,
    router: Router,
    dispatcher: Arc<QueueDispatcher>,
    reporter: Arc<DecisionReporter>,
    store: Option<Arc<dyn SubmissionStore>>,
    hard_caps: HardCaps,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Assemble a controller from its parts.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<SharedCatalog>,
        ledger: Arc<LimitLedger>,
        router: Router,
        dispatcher: Arc<QueueDispatcher>,
        reporter: Arc<DecisionReporter>,
        store: Option<Arc<dyn SubmissionStore>>,
        hard_caps: HardCaps,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            router,
            dispatcher,
            reporter,
            store,
            hard_caps,
            clock,
        }
    }

    /// Shared ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<LimitLedger> {
        &self.ledger
    }

    /// Shared catalog handle.
    #[must_use]
    pub fn catalog(&self) -> &Arc<SharedCatalog> {
        &self.catalog
    }

    /// Decision reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<DecisionReporter> {
        &self.reporter
    }

    /// Admit, route and enqueue one submission.
    pub async fn submit(&self, req: SubmissionRequirement) -> Result<Admitted, AdmissionError> {
        self.submit_with_source(req, None).await
    }

    /// Like [`submit`](Self::submit), carrying an object-store key for the source.
    pub async fn submit_with_source(
        &self,
        req: SubmissionRequirement,
        source_key: Option<String>,
    ) -> Result<Admitted, AdmissionError> {
        let started = Instant::now();
        let submission_id = new_job_id();
        let result = self.admit(submission_id.clone(), &req, source_key).await;

        let latency_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let record = match &result {
            Ok(admitted) => DecisionRecord::accepted(
                admitted.job.id.clone(),
                req.user_id.clone(),
                admitted.job.pool.clone(),
                latency_us,
            ),
            Err(err) => DecisionRecord::rejected(
                submission_id,
                req.user_id.clone(),
                err.reason(),
                err.to_string(),
                rejected_pool(err),
                latency_us,
            ),
        };
        self.reporter.report(record);
        result
    }

    async fn admit(
        &self,
        submission_id: String,
        req: &SubmissionRequirement,
        source_key: Option<String>,
    ) -> Result<Admitted, AdmissionError> {
        self.validate(req)?;

        let now_ms = self.clock.now_ms();
        self.ledger
            .try_consume_submission(&req.user_id, &req.source_address, now_ms)
            .map_err(|scope| AdmissionError::RateLimited { scope })?;

        self.ledger
            .try_reserve(&req.user_id, &req.problem_id)
            .map_err(|scope| AdmissionError::ConcurrencyExhausted { scope })?;
        let reservation = Reservation::new(Arc::clone(&self.ledger), &req.user_id, &req.problem_id);

        let catalog = self.catalog.snapshot();
        let pool = match self.router.select_pool(&catalog, req) {
            Ok(pool) => pool.name.clone(),
            Err(err) => {
                reservation.release("no pool available");
                return Err(err.into());
            }
        };

        if let Err(depth) = self.ledger.check_load(&pool, req.priority) {
            reservation.release("load shed");
            return Err(AdmissionError::Overloaded { pool, depth });
        }

        let mut job = Job {
            id: submission_id,
            pool,
            reservation: req.resources(),
            language: req.language.to_ascii_lowercase(),
            user_id: req.user_id.clone(),
            problem_id: req.problem_id.clone(),
            priority: req.priority,
            source_key,
            enqueued_at_ms: 0,
        };
        self.persist(&mut job).await;

        match self.dispatcher.enqueue(&mut job).await {
            Ok(receipt) => {
                reservation.commit(&job.id);
                self.set_status(&job.id, SubmissionStatus::Queued).await;
                Ok(Admitted { job, receipt })
            }
            Err(source) => {
                reservation.release("dispatch failed");
                self.set_status(&job.id, SubmissionStatus::DispatchFailed).await;
                Err(AdmissionError::DispatchFailed {
                    pool: job.pool,
                    source,
                })
            }
        }
    }

    /// Re-enqueue a job whose dispatch failed earlier, without re-validating or
    /// re-routing. Takes a fresh reservation, released again on failure. A job
    /// that still holds a slot is refused.
    pub async fn retry_dispatch(&self, mut job: Job) -> Result<Admitted, AdmissionError> {
        if self.ledger.holds_job(&job.id) {
            return Err(AdmissionError::InvalidRequirement(format!(
                "job `{}` is already dispatched",
                job.id
            )));
        }
        self.ledger
            .try_reserve(&job.user_id, &job.problem_id)
            .map_err(|scope| AdmissionError::ConcurrencyExhausted { scope })?;
        let reservation = Reservation::new(Arc::clone(&self.ledger), &job.user_id, &job.problem_id);

        match self.dispatcher.enqueue(&mut job).await {
            Ok(receipt) => {
                reservation.commit(&job.id);
                self.set_status(&job.id, SubmissionStatus::Queued).await;
                Ok(Admitted { job, receipt })
            }
            Err(source) => {
                reservation.release("retry dispatch failed");
                Err(AdmissionError::DispatchFailed {
                    pool: job.pool,
                    source,
                })
            }
        }
    }

    /// Terminal outcome reported by the isolation runtime. Releases the job's
    /// reservation exactly once; a repeat for the same job id is refused.
    pub async fn complete(&self, job: &Job, outcome: JobOutcome) -> Result<(), LedgerError> {
        self.ledger
            .release_job(&job.id, &job.user_id, &job.problem_id)?;
        self.set_status(&job.id, outcome.into()).await;
        tracing::info!(job = %job.id, pool = %job.pool, ?outcome, "job finished");
        Ok(())
    }

    fn validate(&self, req: &SubmissionRequirement) -> Result<(), AdmissionError> {
        let caps = &self.hard_caps;
        let invalid = |msg: String| -> Result<(), AdmissionError> {
            Err(AdmissionError::InvalidRequirement(msg))
        };

        if req.user_id.trim().is_empty() {
            return invalid("user_id is required".into());
        }
        if req.problem_id.trim().is_empty() {
            return invalid("problem_id is required".into());
        }
        if req.source_address.trim().is_empty() {
            return invalid("source_address is required".into());
        }
        if !caps.knows(&req.language) {
            return invalid(format!("unknown language `{}`", req.language));
        }
        if req.memory_mb == 0 || req.memory_mb > caps.max_memory_mb {
            return invalid(format!(
                "memory_mb must be in 1..={} (got {})",
                caps.max_memory_mb, req.memory_mb
            ));
        }
        if !(req.cpu_cores.is_finite() && req.cpu_cores > 0.0 && req.cpu_cores <= caps.max_cpu_cores)
        {
            return invalid(format!(
                "cpu_cores must be in (0, {}] (got {})",
                caps.max_cpu_cores, req.cpu_cores
            ));
        }
        if req.timeout_secs == 0 || req.timeout_secs > caps.max_timeout_secs {
            return invalid(format!(
                "timeout_secs must be in 1..={} (got {})",
                caps.max_timeout_secs, req.timeout_secs
            ));
        }
        Ok(())
    }

    async fn persist(&self, job: &mut Job) {
        let Some(store) = &self.store else {
            return;
        };
        match store.create(job).await {
            Ok(id) => job.id = id,
            Err(err) => tracing::warn!(job = %job.id, error = %err, "submission store create failed"),
        }
    }

    async fn set_status(&self, id: &str, status: SubmissionStatus) {
        if let Some(store) = &self.store {
            if let Err(err) = store.update_status(id, status).await {
                tracing::warn!(job = id, %status, error = %err, "submission store update failed");
            }
        }
    }
}

fn rejected_pool(err: &AdmissionError) -> Option<String> {
    match err {
        AdmissionError::Overloaded { pool, .. } | AdmissionError::DispatchFailed { pool, .. } => {
            Some(pool.clone())
        }
        _ => None,
    }
}

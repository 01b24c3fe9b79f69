//! Limit ledger: in-flight counters, token buckets and queue-depth shedding.
//!
//! All mutations are read-modify-write under a lock; no caller ever reads a
//! counter and writes it back in two steps.

pub mod counters;
pub mod shedding;
pub mod token_bucket;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{ConcurrencyLimits, RateLimitConfig, ShedConfig};
use crate::core::{ConcurrencyScope, LedgerError, RateScope};
use crate::util::serde::Priority;

pub use counters::InFlight;
pub use shedding::{LoadShedder, ShedState};
pub use token_bucket::{BucketTable, RateLimiter, TokenBucket, GLOBAL_BUCKET_KEY};

/// Point-in-time copy of the ledger for operators and tests.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    /// In-flight counters.
    pub in_flight: InFlight,
    /// Per-pool queue depth and shedding flag.
    pub queues: HashMap<String, ShedState>,
    /// Jobs currently holding a committed reservation.
    pub held_jobs: usize,
    /// Unbalanced releases detected so far.
    pub corruption_events: u64,
}

/// Process-wide admission state.
#[derive(Debug)]
pub struct LimitLedger {
    limits: ConcurrencyLimits,
    in_flight: Mutex<InFlight>,
    held_jobs: Mutex<HashSet<String>>,
    rate: RateLimiter,
    shedder: LoadShedder,
    corruption_events: AtomicU64,
}

impl LimitLedger {
    /// Build an empty ledger.
    #[must_use]
    pub fn new(limits: ConcurrencyLimits, rate: &RateLimitConfig, shedding: ShedConfig) -> Self {
        Self {
            limits,
            in_flight: Mutex::new(InFlight::default()),
            held_jobs: Mutex::new(HashSet::new()),
            rate: RateLimiter::new(rate),
            shedder: LoadShedder::new(shedding),
            corruption_events: AtomicU64::new(0),
        }
    }

    /// Reserve one in-flight slot for `user` on `problem`.
    pub fn try_reserve(&self, user: &str, problem: &str) -> Result<(), ConcurrencyScope> {
        self.in_flight.lock().try_reserve(&self.limits, user, problem)
    }

    /// Give back a slot taken by `try_reserve`. A release with no matching
    /// reservation leaves counters untouched, is logged, and counted.
    pub fn release(&self, user: &str, problem: &str) -> Result<(), LedgerError> {
        if self.in_flight.lock().release(user, problem) {
            return Ok(());
        }
        Err(self.unbalanced(None, user, problem))
    }

    /// Hand a reserved slot to `job_id`; it stays held until [`release_job`](Self::release_job).
    pub fn bind_job(&self, job_id: &str) {
        self.held_jobs.lock().insert(job_id.to_string());
    }

    /// Whether `job_id` currently owns a slot.
    #[must_use]
    pub fn holds_job(&self, job_id: &str) -> bool {
        self.held_jobs.lock().contains(job_id)
    }

    /// Release the slot owned by `job_id`. A job that holds nothing, including
    /// one already released, is refused even when the same user and problem
    /// still have other jobs in flight.
    pub fn release_job(&self, job_id: &str, user: &str, problem: &str) -> Result<(), LedgerError> {
        if !self.held_jobs.lock().remove(job_id) {
            return Err(self.unbalanced(Some(job_id), user, problem));
        }
        self.release(user, problem)
    }

    fn unbalanced(&self, job: Option<&str>, user: &str, problem: &str) -> LedgerError {
        let total = self.corruption_events.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::error!(
            job = job.unwrap_or(""),
            user,
            problem,
            corruption_events = total,
            "unbalanced release: no matching reservation; counters left untouched"
        );
        LedgerError::UnbalancedRelease {
            user: user.to_string(),
            problem: problem.to_string(),
        }
    }

    /// Single-bucket check for one scope.
    pub fn try_consume(&self, scope: RateScope, key: &str, cost: f64, now_ms: u64) -> bool {
        self.rate.table(scope).try_consume(key, cost, now_ms)
    }

    /// One token from each of user, address and global, or none at all.
    pub fn try_consume_submission(
        &self,
        user: &str,
        address: &str,
        now_ms: u64,
    ) -> Result<(), RateScope> {
        self.rate.try_consume_all(user, address, now_ms)
    }

    /// Last known queue depth for `pool`.
    #[must_use]
    pub fn current_queue_depth(&self, pool: &str) -> u64 {
        self.shedder.state(pool).depth
    }

    /// Record an authoritative depth reading from the broker.
    pub fn observe_queue_depth(&self, pool: &str, depth: u64) -> ShedState {
        self.shedder.observe(pool, depth)
    }

    /// Count a successful enqueue against the pool's depth.
    pub fn record_enqueued(&self, pool: &str) -> ShedState {
        self.shedder.record_enqueued(pool)
    }

    /// `Err(depth)` when `pool` is shedding work of this priority.
    pub fn check_load(&self, pool: &str, priority: Priority) -> Result<(), u64> {
        self.shedder.check(pool, priority)
    }

    /// Drop state for a pool that left the catalog.
    pub fn forget_pool(&self, pool: &str) {
        self.shedder.forget(pool);
    }

    /// Reclaim memory held by buckets that have refilled completely.
    pub fn prune_idle_buckets(&self, now_ms: u64) -> usize {
        self.rate.prune_full(now_ms)
    }

    /// Configured ceilings.
    #[must_use]
    pub const fn limits(&self) -> &ConcurrencyLimits {
        &self.limits
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            in_flight: self.in_flight.lock().clone(),
            held_jobs: self.held_jobs.lock().len(),
            queues: self.shedder.snapshot(),
            corruption_events: self.corruption_events.load(Ordering::Acquire),
        }
    }
}

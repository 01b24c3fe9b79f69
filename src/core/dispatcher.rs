//! Broker handoff with a bounded wait.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::job::Job;
use crate::core::ledger::LimitLedger;
use crate::core::ports::Broker;
use crate::core::BrokerError;
use crate::util::clock::Clock;
use crate::util::serde::JobId;

/// Proof that the broker accepted a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    /// Job that was enqueued.
    pub job_id: JobId,
    /// Pool queue it went to.
    pub pool: String,
    /// Broker-assigned id.
    pub broker_id: String,
    /// Position right after insertion.
    pub position: u64,
    /// Handoff timestamp.
    pub enqueued_at_ms: u64,
    /// Time spent in the broker call.
    pub latency_us: u64,
}

/// Hands admitted jobs to the pool's broker queue.
pub struct QueueDispatcher {
    broker: Arc<dyn Broker>,
    ledger: Arc<LimitLedger>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl QueueDispatcher {
    /// New dispatcher. Every broker call is cut off after `timeout`.
    #[must_use]
    pub fn new(
        broker: Arc<dyn Broker>,
        ledger: Arc<LimitLedger>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            broker,
            ledger,
            clock,
            timeout,
        }
    }

    /// Stamp the job and enqueue it on its pool's queue. A timeout is reported
    /// as `BrokerError::Timeout`; the caller owns compensation.
    pub async fn enqueue(&self, job: &mut Job) -> Result<EnqueueReceipt, BrokerError> {
        job.enqueued_at_ms = self.clock.now_ms();
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.broker.enqueue(&job.pool, job)).await;
        let latency_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        let receipt = match outcome {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => {
                tracing::error!(job = %job.id, pool = %job.pool, error = %err, "broker refused job");
                return Err(err);
            }
            Err(_) => {
                let ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::error!(job = %job.id, pool = %job.pool, timeout_ms = ms, "broker enqueue timed out");
                return Err(BrokerError::Timeout(ms));
            }
        };

        let state = self.ledger.record_enqueued(&job.pool);
        tracing::debug!(
            job = %job.id,
            pool = %job.pool,
            position = receipt.position,
            depth = state.depth,
            latency_us,
            "job enqueued"
        );
        Ok(EnqueueReceipt {
            job_id: job.id.clone(),
            pool: job.pool.clone(),
            broker_id: receipt.broker_id,
            position: receipt.position,
            enqueued_at_ms: job.enqueued_at_ms,
            latency_us,
        })
    }

    /// Ask the broker for a pool's depth, bounded by the same timeout.
    pub async fn queue_depth(&self, pool: &str) -> Result<u64, BrokerError> {
        match tokio::time::timeout(self.timeout, self.broker.queue_depth(pool)).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}

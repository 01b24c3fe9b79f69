//! Interfaces to the external collaborators this layer consumes.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::job::{Job, SubmissionStatus};
use crate::core::BrokerError;
use crate::util::serde::JobId;

/// What the broker hands back when it accepts a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerReceipt {
    /// Broker-assigned message id.
    pub broker_id: String,
    /// Position in the pool queue right after insertion (1-based).
    pub position: u64,
}

/// Work queue broker; one logical queue per pool name.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a job to the pool's queue.
    async fn enqueue(&self, pool: &str, job: &Job) -> Result<BrokerReceipt, BrokerError>;
    /// Current number of jobs waiting in the pool's queue.
    async fn queue_depth(&self, pool: &str) -> Result<u64, BrokerError>;
}

/// Durable record of submissions. Not consulted for admission decisions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a new submission and return its id.
    async fn create(&self, job: &Job) -> Result<JobId, String>;
    /// Move a submission to a new status.
    async fn update_status(&self, id: &str, status: SubmissionStatus) -> Result<(), String>;
}

/// Blob storage for submitted source; opaque to this layer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `code` and return its key.
    async fn upload(&self, code: &[u8], metadata: &[(String, String)]) -> Result<String, String>;
}

/// Average CPU utilization per pool, reported by the fleet.
#[async_trait]
pub trait UtilizationSource: Send + Sync {
    /// Mean worker CPU utilization in `0.0..=1.0`; `None` when unknown.
    async fn cpu_utilization(&self, pool: &str) -> Option<f64>;
}

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

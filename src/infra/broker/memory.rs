//! In-memory broker: one bounded priority queue per pool.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Broker, BrokerError, BrokerReceipt, Job};

/// Orders jobs by priority class (highest first), FIFO within a class.
struct QueuedJob {
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; earlier sequence first within a class (reversed for max-heap).
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct PoolQueue {
    next_seq: u64,
    jobs: BinaryHeap<QueuedJob>,
}

/// In-memory broker for development and tests.
pub struct InMemoryBroker {
    max_depth: usize,
    queues: Mutex<HashMap<String, PoolQueue>>,
    available: AtomicBool,
}

impl InMemoryBroker {
    /// Broker whose per-pool queues hold at most `max_depth` jobs.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            queues: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::Release);
    }

    /// Pop the next job for `pool`, as a worker would.
    pub fn dequeue(&self, pool: &str) -> Option<Job> {
        self.queues
            .lock()
            .get_mut(pool)
            .and_then(|q| q.jobs.pop())
            .map(|q| q.job)
    }

    /// Current depth without going through the async trait.
    #[must_use]
    pub fn depth(&self, pool: &str) -> usize {
        self.queues.lock().get(pool).map_or(0, |q| q.jobs.len())
    }

    fn check_available(&self) -> Result<(), BrokerError> {
        if self.available.load(AtomicOrdering::Acquire) {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("in-memory broker marked unavailable".into()))
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(&self, pool: &str, job: &Job) -> Result<BrokerReceipt, BrokerError> {
        self.check_available()?;
        let mut queues = self.queues.lock();
        let queue = queues.entry(pool.to_string()).or_default();
        if queue.jobs.len() >= self.max_depth {
            return Err(BrokerError::QueueFull(pool.to_string()));
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.jobs.push(QueuedJob {
            seq,
            job: job.clone(),
        });
        Ok(BrokerReceipt {
            broker_id: format!("{pool}-{seq}"),
            position: queue.jobs.len() as u64,
        })
    }

    async fn queue_depth(&self, pool: &str) -> Result<u64, BrokerError> {
        self.check_available()?;
        Ok(self.depth(pool) as u64)
    }
}

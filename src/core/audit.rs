//! Decision records: one per accept/reject, reported without ever blocking
//! the admission path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;

use crate::core::ports::Spawn;
use crate::core::RejectReason;
use crate::util::clock::now_ms;

/// Upper bound on how long a record waits in the buffer when no wakeup arrives.
const DRAIN_INTERVAL: Duration = Duration::from_millis(250);

/// Accept or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Job handed to the broker.
    Accepted,
    /// Submission refused.
    Rejected,
}

/// Structured record of one admission decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Submission identifier.
    pub submission_id: String,
    /// Submitting user.
    pub user_id: String,
    /// Outcome.
    pub decision: Decision,
    /// Reason when rejected.
    pub reason: Option<RejectReason>,
    /// Human-readable detail when rejected.
    pub detail: Option<String>,
    /// Pool chosen, when routing got that far.
    pub pool: Option<String>,
    /// Time spent deciding, in microseconds.
    pub latency_us: u64,
    /// Wall-clock time of the decision.
    pub created_at_ms: u64,
}

impl DecisionRecord {
    /// Record for an accepted job.
    #[must_use]
    pub fn accepted(
        submission_id: impl Into<String>,
        user_id: impl Into<String>,
        pool: impl Into<String>,
        latency_us: u64,
    ) -> Self {
        Self {
            submission_id: submission_id.into(),
            user_id: user_id.into(),
            decision: Decision::Accepted,
            reason: None,
            detail: None,
            pool: Some(pool.into()),
            latency_us,
            created_at_ms: now_ms(),
        }
    }

    /// Record for a rejected submission.
    #[must_use]
    pub fn rejected(
        submission_id: impl Into<String>,
        user_id: impl Into<String>,
        reason: RejectReason,
        detail: impl Into<String>,
        pool: Option<String>,
        latency_us: u64,
    ) -> Self {
        Self {
            submission_id: submission_id.into(),
            user_id: user_id.into(),
            decision: Decision::Rejected,
            reason: Some(reason),
            detail: Some(detail.into()),
            pool,
            latency_us,
            created_at_ms: now_ms(),
        }
    }
}

/// Destination for drained decision records.
pub trait AuditSink: Send {
    /// Store one record.
    fn record(&mut self, record: DecisionRecord);
}

impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn record(&mut self, record: DecisionRecord) {
        self.lock().record(record);
    }
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    records: VecDeque<DecisionRecord>,
    max_records: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_records.min(1024)),
            max_records,
        }
    }

    /// Retrieve a snapshot of stored records.
    #[must_use]
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, record: DecisionRecord) {
        if self.records.len() >= self.max_records {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

/// Non-blocking fan-in for decision records. A full buffer drops the record and
/// counts it.
#[derive(Debug)]
pub struct DecisionReporter {
    tx: Sender<DecisionRecord>,
    rx: Receiver<DecisionRecord>,
    ready: Notify,
    dropped: AtomicU64,
}

impl DecisionReporter {
    /// Reporter buffering up to `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            ready: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Log and enqueue a record. Never blocks, never fails the caller.
    pub fn report(&self, record: DecisionRecord) {
        match record.decision {
            Decision::Accepted => tracing::info!(
                submission = %record.submission_id,
                user = %record.user_id,
                pool = record.pool.as_deref().unwrap_or(""),
                latency_us = record.latency_us,
                "submission accepted"
            ),
            Decision::Rejected => tracing::warn!(
                submission = %record.submission_id,
                user = %record.user_id,
                reason = record.reason.map_or("", RejectReason::as_str),
                detail = record.detail.as_deref().unwrap_or(""),
                pool = record.pool.as_deref().unwrap_or(""),
                latency_us = record.latency_us,
                "submission rejected"
            ),
        }
        match self.tx.try_send(record) {
            Ok(()) => self.ready.notify_one(),
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Move every buffered record into `sink`. Returns how many were moved.
    pub fn drain_into(&self, sink: &mut dyn AuditSink) -> usize {
        let mut moved = 0;
        while let Ok(record) = self.rx.try_recv() {
            sink.record(record);
            moved += 1;
        }
        moved
    }

    /// Records dropped because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records currently buffered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Background task moving buffered records from a [`DecisionReporter`] into
/// an [`AuditSink`]. Wakes on every report, and on a timer as a fallback.
pub struct AuditDrain {
    reporter: Arc<DecisionReporter>,
    sink: Box<dyn AuditSink>,
}

impl AuditDrain {
    /// Drain `reporter` into `sink`.
    #[must_use]
    pub fn new(reporter: Arc<DecisionReporter>, sink: Box<dyn AuditSink>) -> Self {
        Self { reporter, sink }
    }

    /// Move whatever is buffered right now.
    pub fn drain_once(&mut self) -> usize {
        self.reporter.drain_into(self.sink.as_mut())
    }

    /// Drain until `shutdown` flips to `true` or its sender drops, then flush.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let stop = tokio::select! {
                () = self.reporter.ready.notified() => false,
                _ = ticker.tick() => false,
                changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
            };
            self.drain_once();
            if stop {
                tracing::info!("audit drain shutting down");
                break;
            }
        }
    }

    /// Run the drain in the background on `spawner`.
    pub fn spawn<S: Spawn>(self, spawner: &S, shutdown: watch::Receiver<bool>) {
        spawner.spawn(self.run(shutdown));
    }
}

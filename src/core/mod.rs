//! Core decision layer: catalog, ledger, router, admission, dispatch, autoscaling.

pub mod admission;
pub mod audit;
pub mod autoscaler;
pub mod catalog;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod ledger;
pub mod ports;
pub mod router;

pub use admission::{AdmissionController, Admitted};
pub use audit::{
    AuditDrain, AuditSink, Decision, DecisionRecord, DecisionReporter, InMemoryAuditSink,
};
pub use autoscaler::{
    desired_replicas, AutoscaleTable, AutoscaleTarget, AutoscalerLoop, PoolSample, ScaleAction,
    ScaleIntent, ScalePhase,
};
pub use catalog::{PoolCatalog, PoolDescriptor, SharedCatalog, WorkerPolicy};
pub use dispatcher::{EnqueueReceipt, QueueDispatcher};
pub use error::{
    AdmissionError, AppResult, BrokerError, CatalogError, ConcurrencyScope, LedgerError,
    RateScope, RejectReason, RouteError,
};
pub use job::{Job, JobOutcome, SubmissionRequirement, SubmissionStatus};
pub use ledger::{LedgerSnapshot, LimitLedger};
pub use ports::{Broker, BrokerReceipt, ObjectStore, Spawn, SubmissionStore, UtilizationSource};
pub use router::Router;

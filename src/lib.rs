//! # Prometheus Admission
//!
//! Admission control, pool routing and autoscaling for a multi-tenant sandboxed
//! code-execution service.
//!
//! Every submission passes through one pipeline before it reaches a worker:
//!
//! 1. **Validation** against absolute hard caps and the known-language table.
//! 2. **Rate limiting** with token buckets per user, per source address and globally.
//! 3. **Concurrency reservation** against global, per-user and per-problem ceilings.
//! 4. **Routing** to the lowest-priority pool whose capability envelope fits the
//!    requirement. Trusted callers may land on the elevated isolation tier; standard
//!    callers never do.
//! 5. **Load shedding** when the chosen pool's queue is too deep (high priority bypasses).
//! 6. **Dispatch** to the pool's broker queue with a bounded wait. A failed dispatch
//!    releases the reservation before the error is returned.
//!
//! Separately, an autoscaler loop samples queue depth per pool and publishes desired
//! replica counts with scale-up and scale-down cooldowns. Its depth readings are also
//! what lets a shedding pool recover, so a gate that serves traffic must run
//! [`builders::AdmissionGate::start_background`]. The same call starts the drain that
//! moves decision records into the configured audit sink.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_admission::builders::{build_gate, GateParts};
//! use prometheus_admission::config::GateConfig;
//! use prometheus_admission::core::InMemoryAuditSink;
//! use prometheus_admission::infra::{InMemoryBroker, ReportedUtilization};
//! use prometheus_admission::runtime::TokioSpawner;
//! use prometheus_admission::util::clock::SystemClock;
//!
//! let cfg = GateConfig::from_env()?;
//! let gate = build_gate(&cfg, GateParts {
//!     broker: Arc::new(InMemoryBroker::new(10_000)),
//!     store: None,
//!     utilization: Arc::new(ReportedUtilization::new()),
//!     clock: Arc::new(SystemClock),
//!     audit: Some(Box::new(InMemoryAuditSink::new(10_000))),
//! })?;
//! let shutdown = gate.start_background(&TokioSpawner::current()?);
//! let admitted = gate.controller().submit(requirement).await?;
//! // ...
//! shutdown.send(true)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core decision layer: catalog, ledger, router, admission, dispatch, autoscaling.
pub mod core;
/// Configuration models for pools, limits, and the autoscaler.
pub mod config;
/// Builders to construct the admission layer from configuration.
pub mod builders;
/// Infrastructure adapters for brokers, stores, and fleet signals.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

//! Error types for admission components.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token-bucket scope that refused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    /// Submitting user.
    User,
    /// Source address.
    Address,
    /// Shared bucket.
    Global,
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Address => "address",
            Self::Global => "global",
        })
    }
}

/// Concurrency ceiling that refused a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyScope {
    /// All tenants together.
    Global,
    /// One user.
    User,
    /// One problem.
    Problem,
}

impl fmt::Display for ConcurrencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::User => "user",
            Self::Problem => "problem",
        })
    }
}

/// Closed set of reasons a submission can be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Malformed or out-of-range request.
    InvalidRequirement,
    /// A token bucket was empty.
    RateLimited,
    /// An in-flight ceiling was reached.
    ConcurrencyExhausted,
    /// The target pool is shedding load.
    Overloaded,
    /// No pool can run the request.
    NoPoolAvailable,
    /// The broker did not accept the job.
    DispatchFailed,
}

impl RejectReason {
    /// Whether the same request may succeed later without changes.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ConcurrencyExhausted | Self::Overloaded | Self::DispatchFailed
        )
    }

    /// Wire name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequirement => "INVALID_REQUIREMENT",
            Self::RateLimited => "RATE_LIMITED",
            Self::ConcurrencyExhausted => "CONCURRENCY_EXHAUSTED",
            Self::Overloaded => "OVERLOADED",
            Self::NoPoolAvailable => "NO_POOL_AVAILABLE",
            Self::DispatchFailed => "DISPATCH_FAILED",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool catalog failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No pool with that name.
    #[error("unknown pool: {0}")]
    UnknownPool(String),
    /// Configuration failed load-time validation.
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Limit ledger failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Release with no matching reservation.
    #[error("unbalanced release for user `{user}` problem `{problem}`")]
    UnbalancedRelease {
        /// User key.
        user: String,
        /// Problem key.
        problem: String,
    },
}

/// Router failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    /// Nothing in the catalog satisfies the requirement.
    #[error(
        "no pool available for language={language} memory={memory_mb}MB cpu={cpu_cores} timeout={timeout_secs}s"
    )]
    NoPoolAvailable {
        /// Requested language.
        language: String,
        /// Requested memory.
        memory_mb: u32,
        /// Requested CPU.
        cpu_cores: f64,
        /// Requested timeout.
        timeout_secs: u32,
    },
}

/// Broker failures, all treated as dispatch failures by the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// Broker unreachable or refusing work.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    /// The bounded wait elapsed.
    #[error("broker call timed out after {0}ms")]
    Timeout(u64),
    /// The pool's queue is at capacity.
    #[error("queue full for pool `{0}`")]
    QueueFull(String),
    /// Backend I/O failure.
    #[error("broker i/o error: {0}")]
    Io(String),
}

/// Reasons a submission was not admitted.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Structural validation failed.
    #[error("invalid requirement: {0}")]
    InvalidRequirement(String),
    /// A token bucket refused the submission.
    #[error("rate limited ({scope})")]
    RateLimited {
        /// Failing scope.
        scope: RateScope,
    },
    /// An in-flight ceiling was reached.
    #[error("concurrency exhausted ({scope})")]
    ConcurrencyExhausted {
        /// Failing scope.
        scope: ConcurrencyScope,
    },
    /// The chosen pool is shedding load.
    #[error("pool `{pool}` overloaded (queue depth {depth})")]
    Overloaded {
        /// Pool that shed the job.
        pool: String,
        /// Observed depth.
        depth: u64,
    },
    /// Routing failed.
    #[error(transparent)]
    NoPoolAvailable(#[from] RouteError),
    /// Broker handoff failed; the reservation has been released.
    #[error("dispatch to pool `{pool}` failed: {source}")]
    DispatchFailed {
        /// Target pool.
        pool: String,
        /// Broker error.
        #[source]
        source: BrokerError,
    },
}

impl AdmissionError {
    /// Closed reason for this rejection.
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        match self {
            Self::InvalidRequirement(_) => RejectReason::InvalidRequirement,
            Self::RateLimited { .. } => RejectReason::RateLimited,
            Self::ConcurrencyExhausted { .. } => RejectReason::ConcurrencyExhausted,
            Self::Overloaded { .. } => RejectReason::Overloaded,
            Self::NoPoolAvailable(_) => RejectReason::NoPoolAvailable,
            Self::DispatchFailed { .. } => RejectReason::DispatchFailed,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

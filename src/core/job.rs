//! Submission requirements, admitted jobs, and their terminal outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::serde::{JobId, Priority, ResourceRequest, TrustTier};

/// What an incoming submission asks for. Consumed once by admission and routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequirement {
    /// Source language.
    pub language: String,
    /// Requested memory (MB).
    pub memory_mb: u32,
    /// Requested CPU (cores).
    pub cpu_cores: f64,
    /// Requested timeout (seconds).
    pub timeout_secs: u32,
    /// Submitting user.
    pub user_id: String,
    /// Submitter classification; absent means standard.
    #[serde(default)]
    pub trust: Option<TrustTier>,
    /// Address the request came from.
    pub source_address: String,
    /// Problem the code is submitted against.
    pub problem_id: String,
    /// Priority class of the resulting job.
    #[serde(default)]
    pub priority: Priority,
}

impl SubmissionRequirement {
    /// Effective trust tier.
    #[must_use]
    pub fn trust_tier(&self) -> TrustTier {
        self.trust.unwrap_or_default()
    }

    /// The resource triple requested.
    #[must_use]
    pub const fn resources(&self) -> ResourceRequest {
        ResourceRequest {
            memory_mb: self.memory_mb,
            cpu_cores: self.cpu_cores,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// An admitted, routed job. Owned by the dispatcher until the broker accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Submission identifier.
    pub id: JobId,
    /// Pool chosen by the router.
    pub pool: String,
    /// Resources reserved for the run.
    pub reservation: ResourceRequest,
    /// Language of the source.
    pub language: String,
    /// Submitting user; needed to release the reservation.
    pub user_id: String,
    /// Problem key; needed to release the reservation.
    pub problem_id: String,
    /// Priority class.
    pub priority: Priority,
    /// Object-store key of the source, when uploaded through the API.
    #[serde(default)]
    pub source_key: Option<String>,
    /// Set by the dispatcher on handoff.
    pub enqueued_at_ms: u64,
}

/// How a job ended, as reported by the isolation runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Ran to completion.
    Succeeded,
    /// Ran and failed.
    Failed,
    /// Killed at its timeout.
    TimedOut,
    /// Given back without running.
    Released,
}

/// Status written to the submission store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Record created, not yet handed to the broker.
    Admitted,
    /// Broker accepted the job.
    Queued,
    /// Broker refused or timed out.
    DispatchFailed,
    /// Completed successfully.
    Succeeded,
    /// Completed with a failure.
    Failed,
    /// Timed out while running.
    TimedOut,
    /// Released without running.
    Released,
}

impl From<JobOutcome> for SubmissionStatus {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded => Self::Succeeded,
            JobOutcome::Failed => Self::Failed,
            JobOutcome::TimedOut => Self::TimedOut,
            JobOutcome::Released => Self::Released,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admitted => "admitted",
            Self::Queued => "queued",
            Self::DispatchFailed => "dispatch_failed",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

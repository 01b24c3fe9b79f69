//! Shared catalog and request builders for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use prometheus_admission::builders::{build_gate, AdmissionGate, GateParts};
use prometheus_admission::config::{
    AutoscalePolicy, ConcurrencyLimits, GateConfig, LanguageSet, PoolConfig, WorkerPolicyConfig,
};
use prometheus_admission::core::{Broker, SubmissionRequirement, SubmissionStore};
use prometheus_admission::infra::{InMemoryBroker, ReportedUtilization};
use prometheus_admission::util::clock::ManualClock;
use prometheus_admission::util::serde::{IsolationTier, Priority, TrustTier};

pub const START_MS: u64 = 1_700_000_000_000;

pub fn pool(
    name: &str,
    languages: &[&str],
    max_memory_mb: u32,
    isolation: IsolationTier,
    priority: u32,
) -> PoolConfig {
    PoolConfig {
        name: name.into(),
        languages: LanguageSet::from(languages.iter().map(|l| (*l).to_string()).collect::<Vec<_>>()),
        max_memory_mb,
        max_cpu_cores: 2.0,
        max_timeout_secs: 60,
        max_concurrent_jobs: 50,
        isolation,
        priority,
        worker: WorkerPolicyConfig::default(),
        autoscale: AutoscalePolicy::default(),
    }
}

/// Three container pools plus one microVM pool reserved for trusted callers.
pub fn pools() -> Vec<PoolConfig> {
    vec![
        pool(
            "python-sandbox",
            &["python", "javascript", "typescript", "ruby", "php"],
            512,
            IsolationTier::Container,
            10,
        ),
        pool(
            "compiled",
            &["c", "cpp", "java", "go", "rust"],
            1024,
            IsolationTier::Container,
            20,
        ),
        pool("general", &["*"], 2048, IsolationTier::Container, 30),
        pool("secure", &["*"], 4096, IsolationTier::MicroVm, 5),
    ]
}

/// Valid config over [`pools`] with relaxed rate limits so tests hit the
/// stage they target.
pub fn gate_config() -> GateConfig {
    let mut cfg: GateConfig = serde_json::from_value(serde_json::json!({
        "pools": pools(),
        "rate_limits": {
            "user": { "rate_per_sec": 1000.0, "burst_multiplier": 10.0 },
            "address": { "rate_per_sec": 1000.0, "burst_multiplier": 10.0 },
            "global": { "rate_per_sec": 10000.0, "burst_multiplier": 10.0 }
        },
        "shedding": { "queue_depth_threshold": 100, "queue_recovery_threshold": 50 },
        "dispatch": { "broker_timeout_ms": 200 }
    }))
    .unwrap();
    cfg.limits = ConcurrencyLimits {
        global_max_concurrent: 100,
        per_user_max_concurrent: 3,
        per_problem_max_concurrent: 50,
    };
    cfg.validate().unwrap();
    cfg
}

pub fn requirement(language: &str, memory_mb: u32) -> SubmissionRequirement {
    SubmissionRequirement {
        language: language.into(),
        memory_mb,
        cpu_cores: 0.25,
        timeout_secs: 5,
        user_id: "alice".into(),
        trust: None,
        source_address: "10.0.0.1".into(),
        problem_id: "two-sum".into(),
        priority: Priority::Normal,
    }
}

pub fn with_trust(mut req: SubmissionRequirement, trust: TrustTier) -> SubmissionRequirement {
    req.trust = Some(trust);
    req
}

pub fn with_user(mut req: SubmissionRequirement, user: &str) -> SubmissionRequirement {
    req.user_id = user.into();
    req
}

/// Everything a pipeline test needs to poke at.
pub struct Harness {
    pub gate: AdmissionGate,
    pub broker: Arc<InMemoryBroker>,
    pub utilization: Arc<ReportedUtilization>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(cfg: &GateConfig) -> Harness {
    harness_with(cfg, None, None)
}

pub fn harness_with(
    cfg: &GateConfig,
    broker_override: Option<Arc<dyn Broker>>,
    store: Option<Arc<dyn SubmissionStore>>,
) -> Harness {
    let broker = Arc::new(InMemoryBroker::new(10_000));
    let utilization = Arc::new(ReportedUtilization::new());
    let clock = Arc::new(ManualClock::new(START_MS));
    let gate = build_gate(
        cfg,
        GateParts {
            broker: broker_override.unwrap_or_else(|| broker.clone() as Arc<dyn Broker>),
            store,
            utilization: utilization.clone(),
            clock: clock.clone(),
            audit: None,
        },
    )
    .unwrap();
    Harness {
        gate,
        broker,
        utilization,
        clock,
    }
}

pub fn job(id: &str, pool: &str) -> prometheus_admission::core::Job {
    prometheus_admission::core::Job {
        id: id.into(),
        pool: pool.into(),
        reservation: requirement("python", 128).resources(),
        language: "python".into(),
        user_id: "filler".into(),
        problem_id: "filler".into(),
        priority: Priority::Normal,
        source_key: None,
        enqueued_at_ms: START_MS,
    }
}

/// Push `count` filler jobs straight into the broker, bypassing admission.
pub async fn fill(broker: &InMemoryBroker, pool: &str, count: usize) {
    for i in 0..count {
        broker.enqueue(pool, &job(&format!("{pool}-{i}"), pool)).await.unwrap();
    }
}

/// Pop jobs until `pool` holds `remaining`.
pub fn drain_to(broker: &InMemoryBroker, pool: &str, remaining: usize) {
    while broker.depth(pool) > remaining {
        broker.dequeue(pool);
    }
}

//! Tests for configuration validation

use prometheus_admission::config::{
    AutoscalePolicy, GateConfig, HardCaps, LanguageSet, PoolConfig, WorkerPolicyConfig,
};
use prometheus_admission::util::serde::IsolationTier;

use crate::fixtures::{gate_config, pool};

fn valid_pool() -> PoolConfig {
    pool("general", &["*"], 2048, IsolationTier::Container, 10)
}

#[test]
fn test_pool_config_validation() {
    assert!(valid_pool().validate().is_ok());
}

#[test]
fn test_pool_config_invalid_ceilings() {
    let mut invalid = valid_pool();
    invalid.max_memory_mb = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = valid_pool();
    invalid.max_cpu_cores = f64::NAN;
    assert!(invalid.validate().is_err());

    let mut invalid = valid_pool();
    invalid.max_timeout_secs = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = valid_pool();
    invalid.languages = LanguageSet::from(Vec::<String>::new());
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_memory_budget() {
    let mut invalid = valid_pool();
    invalid.worker = WorkerPolicyConfig {
        max_concurrent_jobs: 8,
        memory_per_job_mb: 512,
        node_memory_mb: 2048,
        ..WorkerPolicyConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("4096 MB"), "{err}");
}

#[test]
fn test_autoscale_bounds() {
    let mut invalid = valid_pool();
    invalid.autoscale = AutoscalePolicy {
        min_replicas: 5,
        max_replicas: 2,
        ..AutoscalePolicy::default()
    };
    assert!(invalid.validate().is_err());

    let mut invalid = valid_pool();
    invalid.autoscale.target_queue_depth_per_worker = 0;
    assert!(invalid.validate().is_err());
}

#[test]
fn test_gate_config_validation() {
    assert!(gate_config().validate().is_ok());
}

#[test]
fn test_gate_config_empty_pools() {
    let mut cfg = gate_config();
    cfg.pools.clear();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_gate_config_duplicate_names() {
    let mut cfg = gate_config();
    let dup = cfg.pools[0].clone();
    cfg.pools.push(dup);
    assert!(cfg.validate().unwrap_err().contains("duplicate"));
}

#[test]
fn test_gate_config_shedding_band() {
    let mut cfg = gate_config();
    cfg.shedding.queue_recovery_threshold = cfg.shedding.queue_depth_threshold;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_gate_config_language_coverage() {
    let mut cfg = gate_config();
    cfg.pools.retain(|p| p.name != "general");
    assert!(cfg.validate().is_ok());

    // Only the elevated pool would take cobol; standard callers could never reach it.
    cfg.hard_caps = HardCaps {
        known_languages: ["python", "cobol"].iter().map(|l| (*l).to_string()).collect(),
        ..HardCaps::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("cobol"), "{err}");
}

#[test]
fn test_gate_config_from_json() {
    let json = r#"{
        "pools": [
            {
                "name": "sandbox",
                "languages": ["*"],
                "max_memory_mb": 1024,
                "max_cpu_cores": 1.0,
                "max_timeout_secs": 30,
                "max_concurrent_jobs": 20,
                "isolation": "container",
                "priority": 10
            }
        ],
        "limits": { "per_user_max_concurrent": 2 }
    }"#;

    let config = GateConfig::from_json_str(json).unwrap();
    assert_eq!(config.pools.len(), 1);
    assert!(config.pools[0].languages.is_wildcard());
    assert_eq!(config.limits.per_user_max_concurrent, 2);
    assert_eq!(config.limits.global_max_concurrent, 500);
    assert_eq!(config.decision_buffer, 4096);
    assert_eq!(config.dispatch.broker_timeout_ms, 2_000);
    assert!(config.hard_caps.knows("TypeScript"));
}

#[test]
fn test_gate_config_from_json_rejects_garbage() {
    assert!(GateConfig::from_json_str("{").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_gate_config_from_file() {
    let path = std::env::temp_dir().join(format!("admission-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_string(&gate_config()).unwrap()).unwrap();
    let loaded = GateConfig::from_file(&path).unwrap();
    assert_eq!(loaded.pools.len(), 4);
    let _ = std::fs::remove_file(&path);

    let missing = GateConfig::from_file(&path).unwrap_err();
    assert!(format!("{missing:#}").contains("reading"));
}

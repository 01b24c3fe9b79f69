//! Tests for builder modules

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_admission::builders::{build_gate, GateParts};
use prometheus_admission::core::{CatalogError, Decision, InMemoryAuditSink, JobOutcome};
use prometheus_admission::infra::{InMemoryBroker, ReportedUtilization};
use prometheus_admission::runtime::TokioSpawner;
use prometheus_admission::util::clock::SystemClock;

use crate::fixtures::{gate_config, requirement, with_user};

fn parts() -> GateParts {
    GateParts {
        broker: Arc::new(InMemoryBroker::new(100)),
        store: None,
        utilization: Arc::new(ReportedUtilization::new()),
        clock: Arc::new(SystemClock),
        audit: None,
    }
}

#[test]
fn test_build_gate_from_config() {
    let gate = build_gate(&gate_config(), parts()).unwrap();
    let catalog = gate.catalog().snapshot();
    assert_eq!(catalog.generation(), 0);
    assert_eq!(catalog.pools().count(), 4);
    assert_eq!(gate.table().snapshot().len(), 4);
    assert_eq!(gate.ledger().snapshot().in_flight.global, 0);
}

#[test]
fn test_build_gate_rejects_invalid_config() {
    let mut cfg = gate_config();
    cfg.pools[1].max_concurrent_jobs = 0;
    match build_gate(&cfg, parts()) {
        Err(CatalogError::Invalid(msg)) => assert!(msg.contains("compiled"), "{msg}"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("invalid config accepted"),
    }
}

#[test]
fn test_catalog_lookup() {
    let gate = build_gate(&gate_config(), parts()).unwrap();
    let catalog = gate.catalog().snapshot();
    assert_eq!(catalog.describe("compiled").unwrap().max_memory_mb, 1024);
    assert!(matches!(
        catalog.describe("missing"),
        Err(CatalogError::UnknownPool(name)) if name == "missing"
    ));

    let names: Vec<_> = catalog
        .list_candidates("python")
        .into_iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["secure", "python-sandbox", "general"]);
    assert_eq!(catalog.elevated_pool().unwrap().name, "secure");
    assert_eq!(catalog.worker_policy("general").unwrap().max_concurrent_jobs, 4);
}

#[tokio::test]
async fn test_background_drain_moves_every_decision() {
    let mut cfg = gate_config();
    cfg.decision_buffer = 8;
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(1_000)));
    let gate = build_gate(
        &cfg,
        GateParts {
            audit: Some(Box::new(Arc::clone(&sink))),
            ..parts()
        },
    )
    .unwrap();
    let stop = gate.start_background(&TokioSpawner::current().unwrap());
    let controller = gate.controller();

    for i in 0..40 {
        let req = with_user(requirement("python", 128), &format!("user-{i}"));
        let admitted = controller.submit(req).await.unwrap();
        controller
            .complete(&admitted.job, JobOutcome::Succeeded)
            .await
            .unwrap();
        tokio::task::yield_now().await;
    }
    for _ in 0..100 {
        if sink.lock().records().len() == 40 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let records = sink.lock().records();
    assert_eq!(records.len(), 40);
    assert!(records.iter().all(|r| r.decision == Decision::Accepted));
    assert_eq!(controller.reporter().dropped(), 0);
    assert_eq!(controller.reporter().pending(), 0);
    stop.send(true).unwrap();
}

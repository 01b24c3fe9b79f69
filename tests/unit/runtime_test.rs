//! Tests for the API surface and tokio spawner

use prometheus_admission::core::{RejectReason, Spawn};
use prometheus_admission::infra::InMemoryObjectStore;
use prometheus_admission::runtime::api::{
    health, list_pools, submit, submit_source, SourceSubmission, SubmitResponse,
};
use prometheus_admission::runtime::tokio_spawner::TokioSpawner;
use prometheus_admission::util::serde::IsolationTier;

use crate::fixtures::{gate_config, harness, requirement};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_submit_response_accepted() {
    let h = harness(&gate_config());
    let response = submit(&h.gate.controller(), requirement("go", 256)).await;
    match &response {
        SubmitResponse::Accepted { pool, job_id } => {
            assert_eq!(pool, "compiled");
            assert!(!job_id.is_empty());
        }
        other => panic!("expected acceptance, got {other:?}"),
    }
    assert!(response.is_accepted());

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["pool"], "compiled");
}

#[tokio::test]
async fn test_submit_response_rejected() {
    let h = harness(&gate_config());
    let response = submit(&h.gate.controller(), requirement("python", 4096)).await;
    assert_eq!(
        response,
        SubmitResponse::Rejected {
            reason: RejectReason::NoPoolAvailable,
            detail: "no pool available for language=python memory=4096MB cpu=0.25 timeout=5s"
                .into(),
            retryable: false,
        }
    );
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "rejected");
    assert_eq!(json["reason"], "NO_POOL_AVAILABLE");
}

#[tokio::test]
async fn test_submit_source_uploads_first() {
    let h = harness(&gate_config());
    let objects = InMemoryObjectStore::new();
    let submission: SourceSubmission = serde_json::from_value(serde_json::json!({
        "language": "python",
        "memory_mb": 128,
        "cpu_cores": 0.25,
        "timeout_secs": 5,
        "user_id": "alice",
        "source_address": "10.0.0.1",
        "problem_id": "two-sum",
        "code": "print(1)"
    }))
    .unwrap();

    let response = submit_source(&h.gate.controller(), &objects, submission).await;
    assert!(response.is_accepted());

    let job = h.broker.dequeue("python-sandbox").unwrap();
    let key = job.source_key.expect("source key on job");
    assert_eq!(objects.get(&key).unwrap(), b"print(1)".to_vec());
}

#[tokio::test]
async fn test_list_pools_and_health() {
    let h = harness(&gate_config());
    let controller = h.gate.controller();
    let pools = list_pools(&h.gate.catalog().snapshot());
    assert_eq!(pools.len(), 4);
    let secure = pools.iter().find(|p| p.name == "secure").unwrap();
    assert!(secure.elevated);
    assert_eq!(secure.isolation, IsolationTier::MicroVm);
    assert_eq!(secure.languages, vec!["*".to_string()]);
    assert!(pools.iter().filter(|p| p.name != "secure").all(|p| !p.elevated));

    controller.submit(requirement("python", 128)).await.unwrap();
    h.gate.ledger().observe_queue_depth("general", 500);
    let status = health(&controller);
    assert!(status.ok);
    assert_eq!(status.in_flight, 1);
    assert_eq!(status.catalog_generation, 0);
    assert_eq!(status.shedding_pools, vec!["general".to_string()]);
    assert_eq!(status.dropped_decisions, 0);
}

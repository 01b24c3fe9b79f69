//! Tests for broker and store backends

use prometheus_admission::core::{Broker, BrokerError, SubmissionStatus, SubmissionStore};
use prometheus_admission::infra::{FileBroker, InMemoryBroker, InMemorySubmissionStore};
use prometheus_admission::util::serde::Priority;

use crate::fixtures::job;

#[tokio::test]
async fn test_in_memory_broker_priority_order() {
    let broker = InMemoryBroker::new(16);
    let mut low = job("low", "p");
    low.priority = Priority::Low;
    let mut high = job("high", "p");
    high.priority = Priority::High;

    broker.enqueue("p", &low).await.unwrap();
    broker.enqueue("p", &job("first", "p")).await.unwrap();
    broker.enqueue("p", &high).await.unwrap();
    broker.enqueue("p", &job("second", "p")).await.unwrap();
    assert_eq!(broker.queue_depth("p").await.unwrap(), 4);

    let order: Vec<_> = std::iter::from_fn(|| broker.dequeue("p")).map(|j| j.id).collect();
    assert_eq!(order, vec!["high", "first", "second", "low"]);
}

#[tokio::test]
async fn test_in_memory_broker_queue_full() {
    let broker = InMemoryBroker::new(2);
    broker.enqueue("p", &job("1", "p")).await.unwrap();
    let receipt = broker.enqueue("p", &job("2", "p")).await.unwrap();
    assert_eq!(receipt.position, 2);
    assert_eq!(
        broker.enqueue("p", &job("3", "p")).await.unwrap_err(),
        BrokerError::QueueFull("p".into())
    );
}

#[tokio::test]
async fn test_file_broker_fifo_and_bound() {
    let dir = std::env::temp_dir().join(format!("admission-broker-{}", uuid::Uuid::new_v4()));
    let broker = FileBroker::open(&dir, 2).unwrap();
    broker.enqueue("compiled", &job("a", "compiled")).await.unwrap();
    broker.enqueue("compiled", &job("b", "compiled")).await.unwrap();
    assert!(matches!(
        broker.enqueue("compiled", &job("c", "compiled")).await,
        Err(BrokerError::QueueFull(_))
    ));
    assert_eq!(broker.dequeue("compiled").unwrap().unwrap().id, "a");
    assert_eq!(broker.queue_depth("compiled").await.unwrap(), 1);
    assert!(broker.dequeue("unknown").unwrap().is_none());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_submission_store_lifecycle() {
    let store = InMemorySubmissionStore::new();
    let record = job("s1", "p");
    assert_eq!(store.create(&record).await.unwrap(), "s1");
    assert_eq!(store.status("s1"), Some(SubmissionStatus::Admitted));

    store.update_status("s1", SubmissionStatus::Queued).await.unwrap();
    assert_eq!(store.status("s1"), Some(SubmissionStatus::Queued));
    assert!(store
        .update_status("missing", SubmissionStatus::Failed)
        .await
        .is_err());
}

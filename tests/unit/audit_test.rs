//! Tests for decision records and the audit sink

use prometheus_admission::core::{
    AuditSink, Decision, DecisionRecord, DecisionReporter, InMemoryAuditSink, RejectReason,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    sink.record(DecisionRecord::accepted("job1", "alice", "compiled", 42));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].submission_id, "job1");
    assert_eq!(records[0].decision, Decision::Accepted);
    assert_eq!(records[0].pool.as_deref(), Some("compiled"));
    assert!(records[0].reason.is_none());
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    for id in ["a", "b", "c"] {
        sink.record(DecisionRecord::accepted(id, "alice", "p", 1));
    }
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].submission_id, "b");
    assert_eq!(records[1].submission_id, "c");
}

#[test]
fn test_rejected_record() {
    let record = DecisionRecord::rejected(
        "job2",
        "bob",
        RejectReason::Overloaded,
        "pool `general` overloaded",
        Some("general".into()),
        7,
    );
    assert_eq!(record.decision, Decision::Rejected);
    assert_eq!(record.reason, Some(RejectReason::Overloaded));
    assert!(record.created_at_ms > 0);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["decision"], "rejected");
    assert_eq!(json["reason"], "OVERLOADED");
}

#[test]
fn test_reporter_drops_when_full() {
    let reporter = DecisionReporter::new(2);
    for id in ["a", "b", "c", "d"] {
        reporter.report(DecisionRecord::accepted(id, "alice", "p", 1));
    }
    assert_eq!(reporter.pending(), 2);
    assert_eq!(reporter.dropped(), 2);

    let mut sink = InMemoryAuditSink::new(10);
    assert_eq!(reporter.drain_into(&mut sink), 2);
    assert_eq!(reporter.pending(), 0);
    let ids: Vec<_> = sink.records().into_iter().map(|r| r.submission_id).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

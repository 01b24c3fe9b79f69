//! Tests for utility functions

use prometheus_admission::util::clock::{Clock, ManualClock};
use prometheus_admission::util::serde::{
    new_job_id, IsolationTier, Priority, ResourceRequest, TrustTier,
};

#[test]
fn test_priority_ordering() {
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
    assert_eq!(Priority::default(), Priority::Normal);
}

#[test]
fn test_trust_tiers() {
    assert_eq!(TrustTier::default(), TrustTier::Standard);
    assert!(!TrustTier::Standard.is_elevated());
    assert!(TrustTier::Verified.is_elevated());
    assert!(TrustTier::Admin.is_elevated());
}

#[test]
fn test_isolation_tier_strength_and_names() {
    assert!(IsolationTier::MicroVm.strength() > IsolationTier::Container.strength());
    assert!(IsolationTier::Container.strength() > IsolationTier::Process.strength());
    let json = serde_json::to_string(&IsolationTier::MicroVm).unwrap();
    assert_eq!(json, "\"microvm\"");
    assert_eq!(IsolationTier::Container.to_string(), "container");
}

#[test]
fn test_resource_request() {
    let req: ResourceRequest =
        serde_json::from_str(r#"{"memory_mb":256,"cpu_cores":0.5,"timeout_secs":10}"#).unwrap();
    assert_eq!(req.memory_mb, 256);
    assert!((req.cpu_cores - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_job_ids_are_unique() {
    assert_ne!(new_job_id(), new_job_id());
}

#[test]
fn test_manual_clock() {
    let clock = ManualClock::new(1_000);
    clock.advance_ms(250);
    assert_eq!(clock.now_ms(), 1_250);
    clock.set_ms(10);
    assert_eq!(clock.now_ms(), 10);
}

#[test]
fn test_init_tracing_is_idempotent() {
    prometheus_admission::util::telemetry::init_tracing();
    prometheus_admission::util::telemetry::init_tracing();
}

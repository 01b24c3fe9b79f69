//! Tests for error types

use prometheus_admission::core::{
    AdmissionError, BrokerError, ConcurrencyScope, LedgerError, RateScope, RejectReason,
    RouteError,
};

#[test]
fn test_reject_reason_wire_names() {
    let json = serde_json::to_string(&RejectReason::ConcurrencyExhausted).unwrap();
    assert_eq!(json, "\"CONCURRENCY_EXHAUSTED\"");
    let back: RejectReason = serde_json::from_str("\"NO_POOL_AVAILABLE\"").unwrap();
    assert_eq!(back, RejectReason::NoPoolAvailable);
    assert_eq!(RejectReason::DispatchFailed.to_string(), "DISPATCH_FAILED");
}

#[test]
fn test_retryable_reasons() {
    assert!(RejectReason::RateLimited.is_retryable());
    assert!(RejectReason::Overloaded.is_retryable());
    assert!(RejectReason::DispatchFailed.is_retryable());
    assert!(RejectReason::ConcurrencyExhausted.is_retryable());
    assert!(!RejectReason::InvalidRequirement.is_retryable());
    assert!(!RejectReason::NoPoolAvailable.is_retryable());
}

#[test]
fn test_admission_error_reasons() {
    let cases = [
        (
            AdmissionError::InvalidRequirement("bad".into()),
            RejectReason::InvalidRequirement,
        ),
        (
            AdmissionError::RateLimited {
                scope: RateScope::Global,
            },
            RejectReason::RateLimited,
        ),
        (
            AdmissionError::ConcurrencyExhausted {
                scope: ConcurrencyScope::Problem,
            },
            RejectReason::ConcurrencyExhausted,
        ),
        (
            AdmissionError::Overloaded {
                pool: "p".into(),
                depth: 9,
            },
            RejectReason::Overloaded,
        ),
        (
            AdmissionError::DispatchFailed {
                pool: "p".into(),
                source: BrokerError::Timeout(5),
            },
            RejectReason::DispatchFailed,
        ),
    ];
    for (err, reason) in cases {
        assert_eq!(err.reason(), reason);
    }
}

#[test]
fn test_error_display() {
    let err = AdmissionError::RateLimited {
        scope: RateScope::Address,
    };
    assert_eq!(format!("{}", err), "rate limited (address)");

    let err = AdmissionError::DispatchFailed {
        pool: "compiled".into(),
        source: BrokerError::QueueFull("compiled".into()),
    };
    assert_eq!(
        format!("{}", err),
        "dispatch to pool `compiled` failed: queue full for pool `compiled`"
    );

    let err = LedgerError::UnbalancedRelease {
        user: "u".into(),
        problem: "p".into(),
    };
    assert_eq!(format!("{}", err), "unbalanced release for user `u` problem `p`");
}

#[test]
fn test_route_error_converts() {
    let err: AdmissionError = RouteError::NoPoolAvailable {
        language: "go".into(),
        memory_mb: 9000,
        cpu_cores: 1.0,
        timeout_secs: 5,
    }
    .into();
    assert_eq!(err.reason(), RejectReason::NoPoolAvailable);
    assert!(err.to_string().contains("memory=9000MB"));
}

//! Custom assertion helpers for integration tests.

use vnfm_lifecycle::status::VnfStatus;
use vnfm_lifecycle::vnf::VnfRecord;

use crate::drivers::{Call, CallLog};

/// Asserts that a VNF is in `expected`.
///
/// # Panics
///
/// Panics if the status differs.
pub fn assert_status(vnf: &VnfRecord, expected: VnfStatus) {
    assert_eq!(
        vnf.status, expected,
        "Expected VNF {} to be {expected}, but it was {} (error: {:?})",
        vnf.id, vnf.status, vnf.error_reason
    );
}

/// Asserts that a VNF settled to `ERROR` with a reason containing `fragment`.
///
/// # Panics
///
/// Panics if the VNF is not in `ERROR` or the reason does not match.
pub fn assert_errored_with(vnf: &VnfRecord, fragment: &str) {
    assert_status(vnf, VnfStatus::Error);
    let reason = vnf.error_reason.as_deref().unwrap_or_default();
    assert!(
        reason.contains(fragment),
        "Expected error reason containing {fragment:?}, got {reason:?}"
    );
}

/// Asserts that exactly one call matches `pred`.
///
/// # Panics
///
/// Panics if zero or several calls match.
pub fn assert_called_once(log: &CallLog, what: &str, pred: impl Fn(&Call) -> bool) {
    let n = log.count(pred);
    assert_eq!(n, 1, "Expected exactly one {what}, saw {n}: {:?}", log.calls());
}

/// Asserts that no call matches `pred`.
///
/// # Panics
///
/// Panics if any call matches.
pub fn assert_not_called(log: &CallLog, what: &str, pred: impl Fn(&Call) -> bool) {
    let n = log.count(pred);
    assert_eq!(n, 0, "Expected no {what}, saw {n}: {:?}", log.calls());
}

/// Asserts that the first call matching `first` precedes the first matching
/// `then`.
///
/// # Panics
///
/// Panics if either call is missing or they are out of order.
pub fn assert_called_before(
    log: &CallLog,
    first: impl Fn(&Call) -> bool,
    then: impl Fn(&Call) -> bool,
) {
    let a = log.position(first);
    let b = log.position(then);
    match (a, b) {
        (Some(a), Some(b)) => assert!(a < b, "Calls out of order: {:?}", log.calls()),
        _ => panic!("Expected both calls, got {:?}", log.calls()),
    }
}

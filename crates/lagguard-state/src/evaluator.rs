//! Threshold evaluation.
//!
//! Pure functions over `Copy` inputs; callable from any number of request
//! tasks at once.

use crate::types::{CheckResult, CheckStatus, Snapshot};

pub const MSG_NO_METRIC: &str = "No such metric";
pub const MSG_THRESHOLD_EXCEEDED: &str = "Threshold exceeded";

/// Map the snapshot and threshold to a three-valued status.
///
/// Strictly below the threshold is `Ok`; equality is `Throttled`.
pub fn evaluate(snapshot: Snapshot, threshold: f64) -> CheckStatus {
    match snapshot {
        Snapshot::Absent => CheckStatus::Unknown,
        Snapshot::Present(m) if m.value < threshold => CheckStatus::Ok,
        Snapshot::Present(_) => CheckStatus::Throttled,
    }
}

/// Build the check response for the snapshot and threshold.
pub fn check(snapshot: Snapshot, threshold: f64) -> CheckResult {
    let status = evaluate(snapshot, threshold);
    match (status, snapshot.metric()) {
        (CheckStatus::Ok, Some(m)) => CheckResult {
            status_code: status.http_status(),
            value: m.value,
            threshold,
            message: String::new(),
        },
        (CheckStatus::Throttled, Some(m)) => CheckResult {
            status_code: status.http_status(),
            value: m.value,
            threshold,
            message: MSG_THRESHOLD_EXCEEDED.to_string(),
        },
        _ => CheckResult {
            status_code: CheckStatus::Unknown.http_status(),
            value: 0.0,
            threshold: 0.0,
            message: MSG_NO_METRIC.to_string(),
        },
    }
}

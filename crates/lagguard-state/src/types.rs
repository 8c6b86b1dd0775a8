//! Domain types shared by the collector, the check endpoint, and callers.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{StateError, StateResult};

// ── Metric ────────────────────────────────────────────────────────

/// One aggregated lag measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Aggregated lag in seconds.
    pub value: f64,
    /// Unix timestamp (milliseconds) of the collection cycle.
    pub collected_at_ms: u64,
}

impl Metric {
    pub fn new(value: f64, collected_at_ms: u64) -> StateResult<Self> {
        if !value.is_finite() {
            return Err(StateError::InvalidValue(value));
        }
        Ok(Self {
            value,
            collected_at_ms,
        })
    }
}

// ── Snapshot ──────────────────────────────────────────────────────

/// The metric currently visible to all readers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Snapshot {
    /// No collection cycle has succeeded yet.
    #[default]
    Absent,
    Present(Metric),
}

impl Snapshot {
    pub fn metric(&self) -> Option<&Metric> {
        match self {
            Snapshot::Absent => None,
            Snapshot::Present(m) => Some(m),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Snapshot::Absent)
    }
}

// ── Threshold ─────────────────────────────────────────────────────

/// Local throttling threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThresholdConfig {
    pub threshold: f64,
}

impl ThresholdConfig {
    pub fn new(threshold: f64) -> StateResult<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(StateError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }
}

// ── Check ─────────────────────────────────────────────────────────

/// Outcome of comparing the snapshot to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Unknown,
    Ok,
    Throttled,
}

impl CheckStatus {
    /// HTTP status code the check endpoint answers with.
    pub fn http_status(self) -> u16 {
        match self {
            CheckStatus::Unknown => 404,
            CheckStatus::Ok => 200,
            CheckStatus::Throttled => 417,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Unknown => "unknown",
            CheckStatus::Ok => "ok",
            CheckStatus::Throttled => "throttled",
        }
    }
}

/// Body of a `/throttler/check` response. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckResult {
    pub status_code: u16,
    #[serde(serialize_with = "serialize_number")]
    pub value: f64,
    #[serde(serialize_with = "serialize_number")]
    pub threshold: f64,
    pub message: String,
}

/// Whole numbers go out without a fraction (`0`, not `0.0`).
fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.fract() == 0.0 && value.abs() < EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.status_code == CheckStatus::Ok.http_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_rejects_nan() {
        assert_eq!(
            Metric::new(f64::NAN, 1).unwrap_err().to_string(),
            "invalid metric value NaN: must be finite"
        );
        assert!(Metric::new(f64::INFINITY, 1).is_err());
        assert!(Metric::new(0.25, 1).is_ok());
    }

    #[test]
    fn threshold_validation() {
        assert!(ThresholdConfig::new(0.0).is_ok());
        assert!(ThresholdConfig::new(1.5).is_ok());
        assert_eq!(
            ThresholdConfig::new(-0.1),
            Err(StateError::InvalidThreshold(-0.1))
        );
        assert!(ThresholdConfig::new(f64::NAN).is_err());
    }

    #[test]
    fn snapshot_defaults_to_absent() {
        let snap = Snapshot::default();
        assert!(snap.is_absent());
        assert!(snap.metric().is_none());
    }

    #[test]
    fn check_result_wire_format() {
        let result = CheckResult {
            status_code: 404,
            value: 0.0,
            threshold: 0.0,
            message: "No such metric".to_string(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"StatusCode":404,"Value":0,"Threshold":0,"Message":"No such metric"}"#
        );
    }

    #[test]
    fn check_result_keeps_fractions() {
        let result = CheckResult {
            status_code: 200,
            value: 0.282278,
            threshold: 1.0,
            message: String::new(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"StatusCode":200,"Value":0.282278,"Threshold":1,"Message":""}"#
        );
        let back: CheckResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}

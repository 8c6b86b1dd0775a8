//! Prometheus text exposition format.
//!
//! Renders the throttle state and collector counters for scraping by a
//! Prometheus server or compatible agent.

use lagguard_state::{CheckStatus, ThrottleState};

use crate::stats::CollectorStats;

const STATUSES: [CheckStatus; 3] = [CheckStatus::Unknown, CheckStatus::Ok, CheckStatus::Throttled];

/// Render the current lag, threshold, check status, and per-target
/// counters into Prometheus text format.
pub fn render_prometheus(state: &ThrottleState, stats: &CollectorStats) -> String {
    let snapshot = state.snapshot();
    let threshold = state.threshold().threshold;
    let status = lagguard_state::evaluate(snapshot, threshold);
    let mut out = String::new();

    out.push_str("# HELP lagguard_lag_seconds Aggregated replication lag of the current snapshot.\n");
    out.push_str("# TYPE lagguard_lag_seconds gauge\n");
    if let Some(m) = snapshot.metric() {
        out.push_str(&format!("lagguard_lag_seconds {}\n", m.value));
        out.push_str("# HELP lagguard_snapshot_timestamp_ms Collection time of the current snapshot.\n");
        out.push_str("# TYPE lagguard_snapshot_timestamp_ms gauge\n");
        out.push_str(&format!("lagguard_snapshot_timestamp_ms {}\n", m.collected_at_ms));
    }

    out.push_str("# HELP lagguard_threshold_seconds Configured throttling threshold.\n");
    out.push_str("# TYPE lagguard_threshold_seconds gauge\n");
    out.push_str(&format!("lagguard_threshold_seconds {threshold}\n"));

    out.push_str("# HELP lagguard_check_status Current check status (1 for the active status).\n");
    out.push_str("# TYPE lagguard_check_status gauge\n");
    for s in STATUSES {
        out.push_str(&format!(
            "lagguard_check_status{{status=\"{}\"}} {}\n",
            s.label(),
            u8::from(s == status)
        ));
    }

    out.push_str("# HELP lagguard_collection_cycles_total Completed collection cycles.\n");
    out.push_str("# TYPE lagguard_collection_cycles_total counter\n");
    out.push_str(&format!("lagguard_collection_cycles_total {}\n", stats.cycles()));

    out.push_str("# HELP lagguard_collection_empty_cycles_total Cycles in which every target failed.\n");
    out.push_str("# TYPE lagguard_collection_empty_cycles_total counter\n");
    out.push_str(&format!(
        "lagguard_collection_empty_cycles_total {}\n",
        stats.empty_cycles()
    ));

    let targets = stats.targets();

    out.push_str("# HELP lagguard_target_samples_total Lag samples per target and result.\n");
    out.push_str("# TYPE lagguard_target_samples_total counter\n");
    for t in &targets {
        let name = escape_label(&t.name);
        out.push_str(&format!(
            "lagguard_target_samples_total{{target=\"{}\",kind=\"{}\",result=\"ok\"}} {}\n",
            name, t.kind, t.samples_ok
        ));
        out.push_str(&format!(
            "lagguard_target_samples_total{{target=\"{}\",kind=\"{}\",result=\"failed\"}} {}\n",
            name, t.kind, t.samples_failed
        ));
    }

    out.push_str("# HELP lagguard_target_lag_seconds Last successful lag sample per target.\n");
    out.push_str("# TYPE lagguard_target_lag_seconds gauge\n");
    for t in &targets {
        if let Some(value) = t.last_value {
            out.push_str(&format!(
                "lagguard_target_lag_seconds{{target=\"{}\"}} {}\n",
                escape_label(&t.name),
                value
            ));
        }
    }

    out
}

/// Escape a label value per the text exposition format.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagguard_state::{Metric, ThresholdConfig};

    fn test_state() -> ThrottleState {
        ThrottleState::new(ThresholdConfig::new(1.0).unwrap())
    }

    #[test]
    fn render_cold_start() {
        let stats = CollectorStats::new([("replica-1", "http")]);
        let output = render_prometheus(&test_state(), &stats);

        // Type declarations are always present; the value line is not.
        assert!(output.contains("# TYPE lagguard_lag_seconds gauge"));
        assert!(!output.contains("lagguard_lag_seconds 0"));
        assert!(output.contains("lagguard_threshold_seconds 1\n"));
        assert!(output.contains("lagguard_check_status{status=\"unknown\"} 1"));
        assert!(output.contains("lagguard_check_status{status=\"ok\"} 0"));
        assert!(!output.contains("lagguard_target_lag_seconds{"));
    }

    #[test]
    fn render_after_collection() {
        let state = test_state();
        state.publish(Metric::new(0.25, 1_700_000_000_000).unwrap()).unwrap();
        let stats = CollectorStats::new([("replica-1", "http")]);
        stats.record_success(0, 0.25);
        stats.record_cycle(true);

        let output = render_prometheus(&state, &stats);
        assert!(output.contains("lagguard_lag_seconds 0.25\n"));
        assert!(output.contains("lagguard_snapshot_timestamp_ms 1700000000000\n"));
        assert!(output.contains("lagguard_check_status{status=\"ok\"} 1"));
        assert!(output.contains("lagguard_collection_cycles_total 1\n"));
        assert!(output.contains(
            "lagguard_target_samples_total{target=\"replica-1\",kind=\"http\",result=\"ok\"} 1"
        ));
        assert!(output.contains("lagguard_target_lag_seconds{target=\"replica-1\"} 0.25"));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let state = test_state();
        state.publish(Metric::new(2.0, 1).unwrap()).unwrap();
        let stats = CollectorStats::new([("a", "static"), ("b", "heartbeat")]);
        let output = render_prometheus(&state, &stats);

        // Every non-comment line is `name[{labels}] value`.
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (_, value) = line.rsplit_once(' ').expect("metric line has a value");
            assert!(value.parse::<f64>().is_ok(), "bad value in line: {line}");
        }
        assert!(output.contains("lagguard_check_status{status=\"throttled\"} 1"));
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label("replica-1"), "replica-1");
        assert_eq!(escape_label(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_label(r"c:\db"), r"c:\\db");
        assert_eq!(escape_label("x\ny"), r"x\ny");

        let stats = CollectorStats::new([("a\"b\nc", "static")]);
        stats.record_success(0, 0.5);
        let output = render_prometheus(&test_state(), &stats);
        assert!(output.contains(r#"lagguard_target_lag_seconds{target="a\"b\nc"} 0.5"#));
        // The raw newline never splits a sample line.
        assert!(output.lines().all(|l| !l.starts_with('c')));
    }
}

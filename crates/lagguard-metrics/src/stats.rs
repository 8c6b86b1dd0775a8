//! Collector counters, shared with the `/metrics` endpoint.
//!
//! Lock-free: every counter is an atomic, and the target list is fixed
//! when the collector is built.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bit pattern for "no sample yet". Decodes to a NaN, which is never recorded.
const NO_VALUE: u64 = u64::MAX;

struct TargetCounters {
    name: String,
    kind: &'static str,
    samples_ok: AtomicU64,
    samples_failed: AtomicU64,
    last_value_bits: AtomicU64,
}

struct StatsInner {
    cycles: AtomicU64,
    empty_cycles: AtomicU64,
    targets: Vec<TargetCounters>,
}

/// Point-in-time view of one target's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub name: String,
    pub kind: &'static str,
    pub samples_ok: u64,
    pub samples_failed: u64,
    pub last_value: Option<f64>,
}

/// Shared handle to the collector's counters.
#[derive(Clone)]
pub struct CollectorStats {
    inner: Arc<StatsInner>,
}

impl CollectorStats {
    /// Build counters for `(name, kind)` pairs, indexed in order.
    pub fn new<'a>(targets: impl IntoIterator<Item = (&'a str, &'static str)>) -> Self {
        let targets = targets
            .into_iter()
            .map(|(name, kind)| TargetCounters {
                name: name.to_string(),
                kind,
                samples_ok: AtomicU64::new(0),
                samples_failed: AtomicU64::new(0),
                last_value_bits: AtomicU64::new(NO_VALUE),
            })
            .collect();
        Self {
            inner: Arc::new(StatsInner {
                cycles: AtomicU64::new(0),
                empty_cycles: AtomicU64::new(0),
                targets,
            }),
        }
    }

    pub(crate) fn record_success(&self, index: usize, value: f64) {
        if let Some(t) = self.inner.targets.get(index) {
            t.samples_ok.fetch_add(1, Ordering::Relaxed);
            t.last_value_bits.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    pub(crate) fn record_failure(&self, index: usize) {
        if let Some(t) = self.inner.targets.get(index) {
            t.samples_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_cycle(&self, published: bool) {
        self.inner.cycles.fetch_add(1, Ordering::Relaxed);
        if !published {
            self.inner.empty_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Completed collection cycles.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::Relaxed)
    }

    /// Cycles in which every target failed.
    pub fn empty_cycles(&self) -> u64 {
        self.inner.empty_cycles.load(Ordering::Relaxed)
    }

    pub fn targets(&self) -> Vec<TargetReport> {
        self.inner
            .targets
            .iter()
            .map(|t| {
                let bits = t.last_value_bits.load(Ordering::Relaxed);
                TargetReport {
                    name: t.name.clone(),
                    kind: t.kind,
                    samples_ok: t.samples_ok.load(Ordering::Relaxed),
                    samples_failed: t.samples_failed.load(Ordering::Relaxed),
                    last_value: (bits != NO_VALUE).then(|| f64::from_bits(bits)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let stats = CollectorStats::new([("r1", "static")]);
        assert_eq!(stats.cycles(), 0);
        let reports = stats.targets();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].last_value, None);
        assert_eq!(reports[0].samples_ok, 0);
    }

    #[test]
    fn records_samples_and_cycles() {
        let stats = CollectorStats::new([("r1", "static"), ("r2", "http")]);
        stats.record_success(0, 0.4);
        stats.record_failure(1);
        stats.record_cycle(true);
        stats.record_failure(0);
        stats.record_failure(1);
        stats.record_cycle(false);

        assert_eq!(stats.cycles(), 2);
        assert_eq!(stats.empty_cycles(), 1);

        let reports = stats.targets();
        assert_eq!(reports[0].samples_ok, 1);
        assert_eq!(reports[0].samples_failed, 1);
        // The last good value survives later failures.
        assert_eq!(reports[0].last_value, Some(0.4));
        assert_eq!(reports[1].samples_failed, 2);
        assert_eq!(reports[1].last_value, None);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let stats = CollectorStats::new([("r1", "static")]);
        stats.record_success(7, 1.0);
        stats.record_failure(7);
        assert_eq!(stats.targets()[0].samples_failed, 0);
    }
}

//! The shared throttle state.
//!
//! Constructed once at startup and handed to both the collector and the
//! router. The snapshot lives in a `watch` channel: the writer holds its
//! lock only for the swap and readers only for a `Copy` read. The
//! threshold is an `f64` stored as bits in an atomic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::evaluator;
use crate::types::{CheckResult, CheckStatus, Metric, Snapshot, ThresholdConfig};

struct Inner {
    snapshot: watch::Sender<Snapshot>,
    threshold_bits: AtomicU64,
}

/// Single-writer / multi-reader state behind the check endpoint.
#[derive(Clone)]
pub struct ThrottleState {
    inner: Arc<Inner>,
}

impl ThrottleState {
    /// Create state with an absent snapshot.
    pub fn new(threshold: ThresholdConfig) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::Absent);
        Self {
            inner: Arc::new(Inner {
                snapshot,
                threshold_bits: AtomicU64::new(threshold.threshold.to_bits()),
            }),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        *self.inner.snapshot.borrow()
    }

    /// Subscribe to snapshot publications.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn threshold(&self) -> ThresholdConfig {
        ThresholdConfig {
            threshold: f64::from_bits(self.inner.threshold_bits.load(Ordering::Acquire)),
        }
    }

    /// Replace the threshold. Returns the previous value.
    pub fn set_threshold(&self, threshold: f64) -> StateResult<ThresholdConfig> {
        let next = ThresholdConfig::new(threshold)?;
        let prev = self
            .inner
            .threshold_bits
            .swap(next.threshold.to_bits(), Ordering::AcqRel);
        let prev = f64::from_bits(prev);
        info!(from = prev, to = next.threshold, "threshold updated");
        Ok(ThresholdConfig { threshold: prev })
    }

    /// Publish a new metric, superseding the current snapshot.
    ///
    /// `collected_at_ms` never moves backwards: a metric stamped earlier
    /// than the current one is re-stamped with the current timestamp.
    /// Returns the metric as published.
    pub fn publish(&self, metric: Metric) -> StateResult<Metric> {
        if !metric.value.is_finite() {
            return Err(StateError::InvalidValue(metric.value));
        }

        let mut published = metric;
        self.inner.snapshot.send_modify(|snap| {
            if let Snapshot::Present(prev) = snap {
                published.collected_at_ms = published.collected_at_ms.max(prev.collected_at_ms);
            }
            *snap = Snapshot::Present(published);
        });

        debug!(
            value = published.value,
            collected_at_ms = published.collected_at_ms,
            "snapshot published"
        );
        Ok(published)
    }

    /// Evaluate the current snapshot against the current threshold.
    pub fn status(&self) -> CheckStatus {
        evaluator::evaluate(self.snapshot(), self.threshold().threshold)
    }

    /// Build the check response for whatever is visible right now.
    pub fn check(&self) -> CheckResult {
        evaluator::check(self.snapshot(), self.threshold().threshold)
    }
}

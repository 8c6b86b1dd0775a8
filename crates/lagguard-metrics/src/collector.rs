//! Metric collector: samples every monitored target on a fixed interval,
//! folds the results into one lag value, and publishes it to the
//! `ThrottleState`.
//!
//! A failing target is left out of the cycle's aggregation. A cycle where
//! every target fails publishes nothing, so the last good snapshot stays
//! visible.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use lagguard_core::{Aggregation, LagguardConfig};
use lagguard_state::{Metric, ThrottleState};

use crate::source::{MonitoredTarget, SampleError};
use crate::stats::CollectorStats;

/// Result of one collection cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// A new snapshot was published.
    Published(Metric),
    /// No usable sample; the previous snapshot is retained.
    NoData { failed: usize },
}

/// Samples monitored targets and publishes the aggregated lag.
pub struct MetricCollector {
    targets: Vec<MonitoredTarget>,
    state: ThrottleState,
    interval: Duration,
    query_timeout: Duration,
    aggregation: Aggregation,
    stats: CollectorStats,
}

impl MetricCollector {
    /// Create a collector with `max` aggregation and a query timeout equal
    /// to the interval.
    pub fn new(state: ThrottleState, targets: Vec<MonitoredTarget>, interval: Duration) -> Self {
        let stats = CollectorStats::new(
            targets
                .iter()
                .map(|t| (t.name.as_str(), t.source.kind())),
        );
        Self {
            targets,
            state,
            interval,
            query_timeout: interval,
            aggregation: Aggregation::Max,
            stats,
        }
    }

    /// Build a collector from a validated config.
    pub fn from_config(state: ThrottleState, config: &LagguardConfig) -> anyhow::Result<Self> {
        let targets = config
            .targets
            .iter()
            .map(MonitoredTarget::from_config)
            .collect::<Result<Vec<_>, SampleError>>()?;

        Ok(Self::new(state, targets, config.interval()?)
            .with_query_timeout(config.query_timeout()?)
            .with_aggregation(config.throttler.aggregation))
    }

    /// Bound each sample. Clamped to the interval so a stuck target
    /// cannot stall the next cycle.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout.min(self.interval);
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Counters shared with the `/metrics` endpoint.
    pub fn stats(&self) -> CollectorStats {
        self.stats.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one collection cycle.
    pub async fn collect_once(&self) -> CycleOutcome {
        let mut set = JoinSet::new();
        for (index, target) in self.targets.iter().enumerate() {
            let source = target.source.clone();
            let timeout = self.query_timeout;
            set.spawn(async move {
                let result = match tokio::time::timeout(timeout, source.sample()).await {
                    Ok(result) => result,
                    Err(_) => Err(SampleError::Timeout(timeout)),
                };
                (index, result)
            });
        }

        let mut values = Vec::with_capacity(self.targets.len());
        let mut reported = vec![false; self.targets.len()];
        let mut failed = 0usize;

        while let Some(joined) = set.join_next().await {
            let (index, result) = match joined {
                Ok(sample) => sample,
                Err(e) => {
                    // The target is identified below by never reporting.
                    warn!(error = %SampleError::Task(e.to_string()), "lag sample failed");
                    continue;
                }
            };
            reported[index] = true;
            match result {
                Ok(value) if value.is_finite() => {
                    self.stats.record_success(index, value);
                    values.push(value);
                }
                Ok(value) => {
                    failed += 1;
                    self.stats.record_failure(index);
                    warn!(target_name = %self.targets[index].name, value, "discarding non-finite sample");
                }
                Err(e) => {
                    failed += 1;
                    self.stats.record_failure(index);
                    warn!(target_name = %self.targets[index].name, error = %e, "lag sample failed");
                }
            }
        }

        for index in (0..self.targets.len()).filter(|&i| !reported[i]) {
            failed += 1;
            self.stats.record_failure(index);
            warn!(target_name = %self.targets[index].name, "lag sampling task aborted");
        }

        let outcome = match self.aggregation.apply(&values) {
            Some(value) => self.publish(value, failed),
            None => {
                warn!(failed, "no target produced a sample; keeping last snapshot");
                CycleOutcome::NoData { failed }
            }
        };

        self.stats
            .record_cycle(matches!(outcome, CycleOutcome::Published(_)));
        outcome
    }

    fn publish(&self, value: f64, failed: usize) -> CycleOutcome {
        let published = Metric::new(value, epoch_millis()).and_then(|m| self.state.publish(m));
        match published {
            Ok(metric) => {
                debug!(
                    value = metric.value,
                    aggregation = self.aggregation.label(),
                    failed,
                    "lag collected"
                );
                CycleOutcome::Published(metric)
            }
            Err(e) => {
                warn!(error = %e, "aggregated lag rejected; keeping last snapshot");
                CycleOutcome::NoData { failed }
            }
        }
    }

    /// Run the collection loop until shutdown signal.
    ///
    /// The first cycle runs one interval after start.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            targets = self.targets.len(),
            aggregation = self.aggregation.label(),
            "metric collector started"
        );

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.collect_once().await;
                }
                _ = shutdown.changed() => {
                    info!("metric collector shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

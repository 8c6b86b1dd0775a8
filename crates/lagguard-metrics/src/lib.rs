//! lagguard-metrics: replica lag collection.
//!
//! Samples every monitored target on a fixed interval, folds the samples
//! into one lag value, and publishes it to the shared `ThrottleState`.
//! Also renders the collector's state as Prometheus text.
//!
//! # Architecture
//!
//! ```text
//! MetricCollector
//!   ├── MonitoredTarget × N
//!   │   └── MetricSource::sample() → lag seconds (static | http | heartbeat)
//!   ├── collect_once() → Aggregation::apply() → ThrottleState::publish()
//!   ├── run() → interval loop until shutdown
//!   └── CollectorStats (atomics, shared with /metrics)
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;
pub mod source;
pub mod stats;

pub use collector::{CycleOutcome, MetricCollector};
pub use prometheus::render_prometheus;
pub use source::{
    HeartbeatSource, HttpSource, MetricSource, MonitoredTarget, SampleError, SampleFuture,
    StaticSource,
};
pub use stats::{CollectorStats, TargetReport};

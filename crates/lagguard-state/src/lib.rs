//! lagguard-state: the decision surface shared by the collector and the
//! check endpoint.
//!
//! # Architecture
//!
//! ```text
//! MetricCollector ──publish()──▶ ThrottleState ◀──snapshot()/threshold()── CheckAPI
//!                                   │
//!                                   ├── watch channel: Snapshot (Absent | Present(Metric))
//!                                   └── AtomicU64: threshold (f64 bits)
//!
//! evaluate(snapshot, threshold) → CheckStatus { Unknown, Ok, Throttled }
//! check(snapshot, threshold)    → CheckResult (HTTP status + body)
//! ```
//!
//! `ThrottleState` is `Clone` and cheap to share between tasks. The
//! collector is the only writer of the snapshot; readers never wait on it.

pub mod error;
pub mod evaluator;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use evaluator::{check, evaluate};
pub use store::ThrottleState;
pub use types::*;

//! lagguard-client: the caller side of admission control.
//!
//! Cluster operations poll the throttler before each unit of
//! replication-sensitive work and back off while the answer is not OK.
//!
//! # Architecture
//!
//! ```text
//! AdmissionGate::acquire()
//!   ├── probe() → HEAD /throttler/check → ProbeOutcome
//!   ├── Ok → return, caller does one unit of work
//!   └── Unknown | Throttled | Unreachable
//!         └── Backoff::record() → sleep, poll again
//! ```
//!
//! Exponential backoff (base → max) keeps a throttled caller from
//! hammering the check endpoint. A single OK resets it.
//!
//! `conn::send` is the shared one-shot HTTP/1.1 request used by the probes
//! and by lagguard-metrics' HTTP lag source.

pub mod backoff;
pub mod conn;
pub mod gate;
pub mod probe;

pub use backoff::Backoff;
pub use gate::{AdmissionGate, GateError};
pub use probe::{CHECK_PATH, ProbeError, ProbeOutcome, fetch_check, probe};

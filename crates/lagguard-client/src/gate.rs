//! Admission gate: wait until the throttler says it is safe to proceed.
//!
//! Callers `acquire()` before each unit of replication-sensitive work.
//! The gate never returns success on a non-OK answer.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::backoff::Backoff;
use crate::probe::{CHECK_PATH, ProbeOutcome, probe};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("admission wait cancelled")]
    Cancelled,
    #[error("not admitted after {attempts} polls (last answer: {last:?})")]
    Exhausted { attempts: u32, last: ProbeOutcome },
}

/// Polls a throttler's check endpoint with backoff.
pub struct AdmissionGate {
    address: String,
    path: String,
    probe_timeout: Duration,
    backoff: Backoff,
    max_attempts: Option<u32>,
}

impl AdmissionGate {
    /// Gate against the throttler at `address` (host:port).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            path: CHECK_PATH.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            backoff: Backoff::default(),
            max_attempts: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Give up after this many polls. Unbounded by default.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Poll until the throttler answers OK.
    ///
    /// Returns the number of polls it took. Fails with `Cancelled` when
    /// `shutdown` flips to true, or `Exhausted` when the attempt limit is
    /// reached first.
    pub async fn acquire(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<u32, GateError> {
        let mut attempts = 0u32;

        loop {
            if *shutdown.borrow() {
                return Err(GateError::Cancelled);
            }

            attempts += 1;
            let outcome = probe(&self.address, &self.path, self.probe_timeout).await;
            let delay = self.backoff.record(outcome);

            if outcome.is_ok() {
                return Ok(attempts);
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                info!(attempts, ?outcome, address = %self.address, "admission not granted");
                return Err(GateError::Exhausted {
                    attempts,
                    last: outcome,
                });
            }

            debug!(
                ?outcome,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "throttled, backing off"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // A dropped sender also ends the wait.
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(GateError::Cancelled);
                    }
                }
            }
        }
    }
}

//! Poll backoff for throttled callers.

use std::time::Duration;

use tracing::debug;

use crate::probe::ProbeOutcome;

const DEFAULT_BASE: Duration = Duration::from_millis(100);
const DEFAULT_MAX: Duration = Duration::from_secs(10);

/// Tracks consecutive non-OK answers and the delay before the next poll.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay after the first rejection.
    base: Duration,
    /// Cap on the delay.
    max: Duration,
    /// Delay the next rejection will wait.
    current: Duration,
    consecutive_rejections: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_MAX)
    }
}

impl Backoff {
    /// Exponential backoff doubling from `base` up to `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            consecutive_rejections: 0,
        }
    }

    /// The same delay after every rejection.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// Record a poll outcome and return how long to wait before polling
    /// again. `Ok` resets the backoff and returns zero.
    pub fn record(&mut self, outcome: ProbeOutcome) -> Duration {
        if outcome.is_ok() {
            if self.consecutive_rejections > 0 {
                debug!(
                    rejections = self.consecutive_rejections,
                    "admitted after backoff"
                );
            }
            self.reset();
            return Duration::ZERO;
        }

        self.consecutive_rejections += 1;
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
        self.consecutive_rejections = 0;
    }

    /// Delay the next rejection would wait.
    pub fn next_interval(&self) -> Duration {
        self.current
    }

    pub fn consecutive_rejections(&self) -> u32 {
        self.consecutive_rejections
    }
}

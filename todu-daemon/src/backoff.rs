//! Exponential retry delay for failed sync cycles.

use std::time::Duration;

/// Upper bound on any retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Failure counter plus the delay policy derived from it.
///
/// After `n >= 1` consecutive failures the next wait is
/// `min(base * 2^(n-1), MAX_BACKOFF)`; a success resets the counter and the
/// next wait is `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self::with_max(base, MAX_BACKOFF)
    }

    pub fn with_max(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Count a failed cycle and return the delay before the next one.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay_for(self.failures)
    }

    /// Reset after a successful cycle and return the regular interval.
    pub fn record_success(&mut self) -> Duration {
        self.failures = 0;
        self.base
    }

    /// Delay after `failures` consecutive failures; `base` when `failures == 0`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.base;
        }
        let exponent = (failures - 1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }
}

//! Retry, backoff, and iteration bounds for the loop.
//!
//! Three independent ceilings keep the loop finite:
//! - per-phase retries: a fallible phase re-enters itself at most
//!   `max_retries_per_state` times before escalating to timeout recovery
//! - recoveries: timeout recovery backs off exponentially and gives up after
//!   `max_recoveries` attempts without a completed cycle
//! - iterations: at most `max_iterations` correction prompts per run

use std::time::Duration;

/// Bounds applied by the transition function and the recovery action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-entries allowed for a failing phase before escalation
    pub max_retries_per_state: u32,
    /// Timeout recoveries allowed before the loop aborts
    pub max_recoveries: u32,
    /// Delay of the first recovery
    pub backoff_base: Duration,
    /// Exponent at which the delay stops doubling
    pub backoff_cap_exponent: u32,
    /// Correction prompts allowed per run. Counts prompts, not builds: with
    /// `N` the loop sends at most `N` prompts and triggers at most `N + 1`
    /// builds, so `0` still runs the first build.
    pub max_iterations: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries_per_state: 3,
            max_recoveries: 5,
            backoff_base: Duration::from_secs(2),
            backoff_cap_exponent: 5,
            max_iterations: 10,
        }
    }
}

impl RetryPolicy {
    /// True if a phase that has already been retried `retries` times may retry again
    pub fn can_retry(&self, retries: u32) -> bool {
        retries < self.max_retries_per_state
    }

    /// True once `recoveries` attempts have been spent
    pub fn recovery_exhausted(&self, recoveries: u32) -> bool {
        recoveries >= self.max_recoveries
    }

    /// Delay before recovery attempt number `recoveries` (0-based).
    ///
    /// `base * 2^min(recoveries, cap)`: doubles each attempt up to the cap,
    /// then stays constant.
    pub fn backoff_delay(&self, recoveries: u32) -> Duration {
        let exponent = recoveries.min(self.backoff_cap_exponent);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        let delay = self.backoff_base.saturating_mul(factor);

        tracing::debug!(
            recoveries,
            exponent,
            delay_ms = delay.as_millis() as u64,
            "Computed recovery backoff"
        );
        delay
    }
}

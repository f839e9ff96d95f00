//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Tracks consecutive failures of a repeating operation (e.g. `accept`).
///
/// Each failure yields the next delay; a success resets the run. Once
/// `max_failures` consecutive failures have been recorded the backoff is
/// exhausted and the caller should give up.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    max_failures: u32,
    failures: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64, max_failures: u32) -> Self {
        Self {
            base_ms,
            max_ms,
            max_failures,
            failures: 0,
        }
    }

    /// Record a failure. Returns the delay to wait, or `None` once exhausted.
    pub fn fail(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.max_failures {
            return None;
        }
        Some(calculate_backoff(self.failures, self.base_ms, self.max_ms))
    }

    /// Record a failure and return the delay, ignoring `max_failures`.
    pub fn retry(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        calculate_backoff(self.failures, self.base_ms, self.max_ms)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

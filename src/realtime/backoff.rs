//! Exponential reconnect backoff.

use std::time::Duration;

/// How many reconnects to try and how long to wait before each.
///
/// Attempt `n` (1-based) waits `base_interval * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    base_interval: Duration,
}

impl ReconnectPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(5000);

    pub fn new(max_attempts: u32, base_interval: Duration) -> Self {
        Self {
            max_attempts,
            base_interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Delay before reconnect attempt `attempt`, or `None` if that attempt is
    /// outside `1..=max_attempts`.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_interval.saturating_mul(factor))
    }

    /// The attempt number that follows `current` failed attempts, if any remain.
    pub fn next_attempt(&self, current: u32) -> Option<u32> {
        (current < self.max_attempts).then(|| current + 1)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_INTERVAL)
    }
}

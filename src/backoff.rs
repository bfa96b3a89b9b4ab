//! Delay schedule between write rounds.
//!
//! The delay starts at a base value and doubles for every retry round.
//! There is no ceiling unless one is configured.

use std::time::Duration;

/// Default delay before the first retry round.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Whole milliseconds of `delay`, saturating at `u64::MAX`.
pub fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Exponential backoff with an optional cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
    retries: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: None,
            retries: 0,
        }
    }

    /// Cap every computed delay at `max`.
    pub fn with_max_delay(mut self, max: Option<Duration>) -> Self {
        self.max = max;
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Number of delays handed out so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before the `retry`-th retry round (1-based): `base * 2^(retry - 1)`.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let raw = 2u32
            .checked_pow(exponent)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max {
            Some(max) => raw.min(max),
            None => raw,
        }
    }

    /// Advance the schedule and return the delay to wait now.
    pub fn next_delay(&mut self) -> Duration {
        self.retries += 1;
        self.delay_for(self.retries)
    }
}

//! Retry policy for transient fetch failures.

use parcelwatch_core::{ErrorKind, FetchSettings};
use rand::Rng;
use std::time::Duration;

/// Rate-limited failures back off this many times longer than others.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 3;

/// Exponential backoff with jitter, capped.
///
/// Only transient error kinds are retried, and only while fewer than
/// `max_attempts` attempts have been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first attempt.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Total attempts allowed per fetch.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether to try again after `attempt` attempts ended with `kind`.
    #[must_use]
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        kind.is_transient() && attempt < self.max_attempts
    }

    /// How long to wait after the `attempt`-th failure (1-based).
    ///
    /// The ceiling doubles with each attempt up to `max_delay`; the actual
    /// delay is drawn uniformly from the upper half of the ceiling.
    #[must_use]
    pub fn delay_for(&self, kind: ErrorKind, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let mut ceiling = self.base_delay.saturating_mul(1 << exponent);
        if kind == ErrorKind::RateLimited {
            ceiling = ceiling.saturating_mul(RATE_LIMIT_BACKOFF_MULTIPLIER);
        }
        let ceiling = u64::try_from(ceiling.min(self.max_delay).as_millis()).unwrap_or(u64::MAX);

        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(ceiling / 2..=ceiling))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchSettings::default())
    }
}

impl From<&FetchSettings> for RetryPolicy {
    fn from(settings: &FetchSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
    }
}

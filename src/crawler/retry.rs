//! Retry policy for transient fetch failures

use crate::config::FetcherConfig;
use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff with random jitter
///
/// `delay(attempt)` is `min(base * 2^attempt, max)` plus up to
/// `jitter_percent` of that value, drawn uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_ms: u64,
    max_ms: u64,
    jitter_percent: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_attempts,
            base_ms,
            max_ms,
            jitter_percent: 50,
        }
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.retry_base_delay_ms,
            config.retry_max_delay_ms,
        )
        .with_jitter(config.retry_jitter_percent)
    }

    /// Total attempts per URL, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True if another attempt is allowed after `attempt` (zero-based) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// The base delay before retrying after `attempt` failed, without jitter
    pub fn capped_delay_ms(&self, attempt: u32) -> u64 {
        self.base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)))
            .min(self.max_ms)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay_ms(attempt);
        let spread = capped.saturating_mul(self.jitter_percent) / 100;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..=spread)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

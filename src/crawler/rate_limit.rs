//! Request pacing shared by every fetch
//!
//! Two independent delays apply before a request goes out:
//! - a randomized politeness delay whose range depends on the request kind
//! - a minimum interval since the previous request from any worker

use crate::config::RateLimitConfig;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// What a request is for; selects the politeness delay range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A page of a year's listing
    Listing,
    /// An accident detail page
    Record,
}

/// Global rate limiter
///
/// Cloned behind an `Arc` into every worker so that the minimum interval is
/// enforced across the whole process, not per task.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_request: Mutex::new(None),
        }
    }

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    /// Randomized politeness delay for a request kind
    pub fn politeness_delay(&self, kind: RequestKind) -> Duration {
        if !self.config.enabled {
            return Duration::ZERO;
        }

        let (min, max) = match kind {
            RequestKind::Listing => (
                self.config.listing_delay_min_ms,
                self.config.listing_delay_max_ms,
            ),
            RequestKind::Record => (
                self.config.record_delay_min_ms,
                self.config.record_delay_max_ms,
            ),
        };

        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Waits until a request of `kind` may be sent
    pub async fn wait(&self, kind: RequestKind) {
        if !self.config.enabled {
            return;
        }

        let delay = self.politeness_delay(kind);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        // Held across the sleep so concurrent workers queue up behind each other
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let min_interval = Duration::from_millis(self.config.min_interval_ms);
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

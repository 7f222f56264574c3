//! Two-tier request pacing
//!
//! The registry tolerates short bursts at a relaxed pace but clamps down on
//! sustained traffic. Requests are spaced by the short delay until activity
//! has been continuous for longer than the short period, then by the long
//! delay. An idle gap longer than the reset period starts a fresh burst.

use crate::config::RateLimitConfig;
use log::{debug, trace};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

#[derive(Debug, Default)]
struct RateState {
    last_request: Option<Instant>,
    activity_started: Option<Instant>,
}

/// Rate limiter for one transport
///
/// The internal lock is held while waiting, so concurrent callers leave one at
/// a time with the configured spacing between them.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    config: RateLimitConfig,
    state: Mutex<RateState>,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
        Self {
            name,
            config,
            state: Mutex::new(RateState::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Suspend until the next request may be sent, then record the send time.
    ///
    /// Returns how long the caller was held back.
    pub async fn ensure_rate(&self) -> Duration {
        self.ensure_rate_with(false).await
    }

    /// Like [`ensure_rate`](Self::ensure_rate), optionally forcing the short
    /// delay (keepalive pings are never held to the long tier).
    pub async fn ensure_rate_with(&self, force_short_delay: bool) -> Duration {
        trace!("{} rate limiter: acquiring state lock...", self.name);
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let idle = state.last_request.map(|last| now.duration_since(last));

        let fresh_burst = match idle {
            None => true,
            Some(idle) => idle > self.config.reset_period(),
        };
        if fresh_burst {
            trace!("{} rate limiter: starting a fresh burst", self.name);
            state.activity_started = Some(now);
        }

        let active = state
            .activity_started
            .map(|started| now.duration_since(started))
            .unwrap_or_default();
        let delay = self.delay_for(active, force_short_delay);

        let mut waited = Duration::ZERO;
        if let Some(idle) = idle
            && idle < delay
        {
            waited = delay - idle;
            debug!(
                "{} rate limiter: waiting {waited:?} (delay {delay:?}, active for {active:?})",
                self.name
            );
            sleep(waited).await;
        }

        state.last_request = Some(Instant::now());
        waited
    }

    /// The spacing the next request would currently be held to
    pub async fn current_delay(&self) -> Duration {
        let state = self.state.lock().await;
        let now = Instant::now();
        let idle = state.last_request.map(|last| now.duration_since(last));
        let active = match (idle, state.activity_started) {
            (Some(idle), Some(started)) if idle <= self.config.reset_period() => {
                now.duration_since(started)
            }
            _ => Duration::ZERO,
        };
        self.delay_for(active, false)
    }

    fn delay_for(&self, active: Duration, force_short_delay: bool) -> Duration {
        if !force_short_delay && active > self.config.short_period() {
            self.config.long_delay()
        } else {
            self.config.short_delay()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            short_delay_ms: 2_000,
            long_delay_ms: 4_000,
            short_period_secs: 20,
            reset_period_secs: 60,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new("test", test_config());

        let waited = limiter.ensure_rate().await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_delay_between_requests() {
        let limiter = RateLimiter::new("test", test_config());

        limiter.ensure_rate().await;
        let start = Instant::now();
        limiter.ensure_rate().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_to_long_delay_after_short_period() {
        let limiter = RateLimiter::new("test", test_config());

        let mut sends = Vec::new();
        for _ in 0..20 {
            limiter.ensure_rate().await;
            sends.push(Instant::now());
        }

        let first = sends[0];
        for pair in sends.windows(2) {
            let gap = pair[1] - pair[0];
            let active = pair[0] - first;
            if active > Duration::from_secs(20) {
                assert!(gap >= Duration::from_secs(4), "gap {gap:?} at {active:?}");
            } else {
                assert!(gap >= Duration::from_secs(2), "gap {gap:?} at {active:?}");
            }
        }
        assert_eq!(limiter.current_delay().await, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_resets_to_short_delay() {
        let limiter = RateLimiter::new("test", test_config());

        for _ in 0..15 {
            limiter.ensure_rate().await;
        }
        assert_eq!(limiter.current_delay().await, Duration::from_secs(4));

        sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.current_delay().await, Duration::from_secs(2));

        limiter.ensure_rate().await;
        let start = Instant::now();
        limiter.ensure_rate().await;
        let gap = start.elapsed();
        assert!(gap >= Duration::from_secs(2));
        assert!(gap < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_short_delay_ignores_long_tier() {
        let limiter = RateLimiter::new("test", test_config());

        for _ in 0..15 {
            limiter.ensure_rate().await;
        }
        let start = Instant::now();
        limiter.ensure_rate_with(true).await;
        let gap = start.elapsed();
        assert!(gap >= Duration::from_secs(2));
        assert!(gap < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let limiter = Arc::new(RateLimiter::new("test", test_config()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.ensure_rate().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }
}

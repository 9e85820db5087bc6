//! Per-action outbound call throttle
//!
//! The only process-wide shared state in the provider. Each API action name
//! gets a minimum spacing between calls derived from its calls-per-second
//! limit; a call that arrives early waits for its slot.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::time::{Instant, sleep};

pub const DEFAULT_CALLS_PER_SECOND: u32 = 20;

static GLOBAL: OnceLock<RateLimiter> = OnceLock::new();

#[derive(Debug)]
pub struct RateLimiter {
    default_interval: Duration,
    overrides: HashMap<String, Duration>,
    next_slot: Mutex<HashMap<String, Instant>>,
}

fn interval(calls_per_second: u32) -> Duration {
    if calls_per_second == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(1) / calls_per_second
    }
}

impl RateLimiter {
    /// `calls_per_second == 0` disables throttling
    pub fn new(calls_per_second: u32) -> Self {
        Self {
            default_interval: interval(calls_per_second),
            overrides: HashMap::new(),
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limit(mut self, action: impl Into<String>, calls_per_second: u32) -> Self {
        self.overrides.insert(action.into(), interval(calls_per_second));
        self
    }

    /// Install the process-wide limiter; returns false if one is already set
    pub fn init_global(limiter: RateLimiter) -> bool {
        GLOBAL.set(limiter).is_ok()
    }

    /// Process-wide limiter, defaulting to [`DEFAULT_CALLS_PER_SECOND`]
    pub fn global() -> &'static RateLimiter {
        GLOBAL.get_or_init(|| RateLimiter::new(DEFAULT_CALLS_PER_SECOND))
    }

    pub fn interval_for(&self, action: &str) -> Duration {
        self.overrides
            .get(action)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Wait until `action` may be called
    pub async fn check(&self, action: &str) {
        let spacing = self.interval_for(action);
        if spacing.is_zero() {
            return;
        }

        let wait = {
            let mut slots = self
                .next_slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let slot = slots.entry(action.to_string()).or_insert(now);
            let start = (*slot).max(now);
            *slot = start + spacing;
            start - now
        };

        if !wait.is_zero() {
            tracing::debug!(action, ?wait, "rate limited");
            sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CALLS_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals() {
        let limiter = RateLimiter::new(20).with_limit("CreateInstance", 2);
        assert_eq!(limiter.interval_for("DescribeInstances"), Duration::from_millis(50));
        assert_eq!(limiter.interval_for("CreateInstance"), Duration::from_millis(500));
        assert_eq!(RateLimiter::new(0).interval_for("x"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_per_action() {
        let limiter = RateLimiter::new(10);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.check("DescribeInstances").await;
        }
        assert_eq!(start.elapsed(), Duration::from_millis(200));

        // another action has its own slot
        let before = Instant::now();
        limiter.check("DescribeIndexMeta").await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}

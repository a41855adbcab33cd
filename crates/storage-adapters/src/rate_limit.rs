//! Fixed-window admission control keyed by caller.
//!
//! Every key owns a counter and the instant its current window opened. The
//! table is a [`DashMap`], so each decision only locks the shard holding that
//! key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use domains::RateLimiter;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 20,
            window: Duration::from_secs(5),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Instant,
    count: u32,
}

pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Admission decision for `key` as seen at `now`.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut entry = self.windows.entry(key.to_owned()).or_insert(Window {
            opened_at: now,
            count: 0,
        });
        let window = entry.value_mut();
        if now.saturating_duration_since(window.opened_at) >= self.config.window {
            window.opened_at = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);
        window.count <= self.config.requests_per_window
    }

    /// Drops every key whose window had already elapsed at `now`. Such a key
    /// would be reset on its next call anyway.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.config.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.opened_at) < window);
        before.saturating_sub(self.windows.len())
    }

    /// Sweeps idle keys once per window until the returned handle is aborted.
    pub fn spawn_eviction(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = limiter.config.window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.evict_idle_at(Instant::now());
                if evicted > 0 {
                    debug!(evicted, remaining = limiter.tracked(), "rate limiter sweep");
                }
            }
        })
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn retry_after(&self) -> Duration {
        self.config.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window_ms: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig {
            requests_per_window: limit,
            window: Duration::from_millis(window_ms),
            enabled: true,
        })
    }

    #[test]
    fn limit_passes_then_denies_until_next_window() {
        let limiter = limiter(3, 1000);
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.allow_at("10.0.0.1", start));
        }
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_millis(999)));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_millis(1000)));
    }

    #[test]
    fn keys_are_counted_independently() {
        let limiter = limiter(1, 1000);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn disabled_limiter_permits_everything() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig {
            requests_per_window: 1,
            window: Duration::from_secs(60),
            enabled: false,
        });
        for _ in 0..100 {
            assert!(limiter.allow("caller"));
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn eviction_only_drops_elapsed_windows() {
        let limiter = limiter(5, 100);
        let start = Instant::now();
        limiter.allow_at("old", start);
        limiter.allow_at("fresh", start + Duration::from_millis(80));

        assert_eq!(limiter.evict_idle_at(start + Duration::from_millis(120)), 1);
        assert_eq!(limiter.tracked(), 1);
        assert!(limiter.allow_at("old", start + Duration::from_millis(120)));
    }

    #[test]
    fn concurrent_callers_never_exceed_the_limit() {
        let limiter = Arc::new(limiter(50, 60_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[tokio::test]
    async fn background_sweep_evicts_idle_keys() {
        let limiter = Arc::new(FixedWindowLimiter::new(RateLimitConfig {
            requests_per_window: 5,
            window: Duration::from_secs(1),
            enabled: true,
        }));
        limiter.allow_at("idle", Instant::now() - Duration::from_secs(5));
        let sweeper = limiter.spawn_eviction();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(limiter.tracked(), 0);
        sweeper.abort();
    }
}

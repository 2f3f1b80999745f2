//! Per-key token bucket admission control.
//!
//! Each key (credential prefix or source address) gets a bucket holding up
//! to `ceiling` tokens. Tokens refill continuously at `ceiling / window` per
//! second, fractional amounts included, and each admitted request consumes
//! one. Buckets are created full on first use and reclaimed by a periodic
//! sweep once idle past the retention window.
//!
//! The bucket map is a [`DashMap`], so concurrent checks on different keys
//! only contend when they hash to the same shard.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Floor for the sweep interval; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    ceiling: u32,
    last_refill: Instant,
}

impl Bucket {
    fn full(ceiling: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(ceiling),
            ceiling,
            last_refill: now,
        }
    }

    /// Tokens available at `now`, clamped to the ceiling.
    fn refilled(&self, window: Duration, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let rate = f64::from(self.ceiling) / window.as_secs_f64();
        (self.tokens + elapsed * rate).clamp(0.0, f64::from(self.ceiling))
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Ceiling applied to the key.
    pub limit: u32,
    /// Whole tokens left after this call.
    pub remaining: u32,
}

/// Token bucket rate limiter keyed by string.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter refilling each bucket once per `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            window: window.max(Duration::from_millis(1)),
        }
    }

    /// Consume one token for `key` if available.
    pub fn allow(&self, key: &str, ceiling: u32) -> bool {
        self.check(key, ceiling).allowed
    }

    /// Consume one token and report the bucket state.
    pub fn check(&self, key: &str, ceiling: u32) -> RateDecision {
        self.check_at(key, ceiling, Instant::now())
    }

    pub fn check_at(&self, key: &str, ceiling: u32, now: Instant) -> RateDecision {
        let ceiling = ceiling.max(1);
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(ceiling, now));

        // A credential's ceiling can change between requests; refill clamps to it.
        bucket.ceiling = ceiling;
        bucket.tokens = bucket.refilled(self.window, now);
        bucket.last_refill = now;

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        } else {
            debug!(key = %key, ceiling, "rate limit exceeded");
        }

        RateDecision {
            allowed,
            limit: ceiling,
            remaining: bucket.tokens.floor() as u32,
        }
    }

    /// Whole tokens currently available for `key`; 0 for unknown keys.
    pub fn remaining(&self, key: &str) -> u32 {
        self.remaining_at(key, Instant::now())
    }

    pub fn remaining_at(&self, key: &str, now: Instant) -> u32 {
        self.buckets
            .get(key)
            .map(|b| b.refilled(self.window, now).floor() as u32)
            .unwrap_or(0)
    }

    /// Drop buckets idle for at least `retention`. Returns how many were removed.
    pub fn sweep(&self, retention: Duration) -> usize {
        self.sweep_at(retention, Instant::now())
    }

    pub fn sweep_at(&self, retention: Duration, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_refill) < retention);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Spawn the background sweep. The task runs until aborted.
    ///
    /// Intervals below one millisecond are raised to it.
    pub fn spawn_sweeper(
        limiter: Arc<Self>,
        interval: Duration,
        retention: Duration,
    ) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep(retention);
                crate::metrics::set_rate_limit_buckets(limiter.len());
                if removed > 0 {
                    info!(removed, remaining = limiter.len(), "swept idle rate limit buckets");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_ceiling_then_denied() {
        let limiter = RateLimiter::new(HOUR);
        let now = Instant::now();
        for i in 0..5 {
            let d = limiter.check_at("token:a", 5, now);
            assert!(d.allowed, "call {i}");
            assert_eq!(d.remaining, 4 - i);
        }
        let denied = limiter.check_at("token:a", 5, now);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.limit, 5);
    }

    #[test]
    fn test_refills_after_window() {
        let limiter = RateLimiter::new(HOUR);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("k", 3, start).allowed);
        }
        assert!(!limiter.check_at("k", 3, start).allowed);
        let later = start + HOUR;
        assert!(limiter.check_at("k", 3, later).allowed);
        assert_eq!(limiter.remaining_at("k", later), 2);
    }

    #[test]
    fn test_fractional_refill_accumulates() {
        // 3600/h is one token per second.
        let limiter = RateLimiter::new(HOUR);
        let start = Instant::now();
        for _ in 0..3600 {
            limiter.check_at("k", 3600, start);
        }
        assert!(!limiter.check_at("k", 3600, start).allowed);
        assert!(!limiter.check_at("k", 3600, start + Duration::from_millis(500)).allowed);
        // Half tokens from both waits add up.
        assert!(limiter.check_at("k", 3600, start + Duration::from_millis(1000)).allowed);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(HOUR);
        let now = Instant::now();
        assert!(limiter.check_at("a", 1, now).allowed);
        assert!(!limiter.check_at("a", 1, now).allowed);
        assert!(limiter.check_at("b", 1, now).allowed);
        assert_eq!(limiter.remaining_at("a", now), 0);
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_unknown_key_has_no_remaining() {
        let limiter = RateLimiter::new(HOUR);
        assert_eq!(limiter.remaining("nobody"), 0);
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_tokens_never_exceed_ceiling() {
        let limiter = RateLimiter::new(HOUR);
        let start = Instant::now();
        limiter.check_at("k", 10, start);
        assert_eq!(limiter.remaining_at("k", start + HOUR * 5), 10);
    }

    #[test]
    fn test_lowered_ceiling_clamps_tokens() {
        let limiter = RateLimiter::new(HOUR);
        let now = Instant::now();
        limiter.check_at("k", 100, now);
        let d = limiter.check_at("k", 10, now);
        assert!(d.allowed);
        assert_eq!(d.remaining, 9);
    }

    #[test]
    fn test_sweep_removes_idle_only() {
        let limiter = RateLimiter::new(HOUR);
        let start = Instant::now();
        limiter.check_at("idle", 5, start);
        limiter.check_at("busy", 5, start + Duration::from_secs(500));
        let removed = limiter.sweep_at(Duration::from_secs(600), start + Duration::from_secs(700));
        assert_eq!(removed, 1);
        assert_eq!(limiter.remaining("idle"), 0);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_sweeper_keeps_running() {
        let limiter = Arc::new(RateLimiter::new(HOUR));
        limiter.check("stale", 5);
        let handle =
            RateLimiter::spawn_sweeper(Arc::clone(&limiter), Duration::ZERO, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert!(limiter.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_concurrent_checks_respect_ceiling() {
        let limiter = Arc::new(RateLimiter::new(HOUR));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..50).filter(|_| limiter.allow("shared", 100)).count()
            }));
        }
        let mut admitted = 0;
        for h in handles {
            admitted += h.await.unwrap();
        }
        // A few tokens may refill while the tasks run.
        assert!((100..=101).contains(&admitted), "admitted {admitted}");
    }
}

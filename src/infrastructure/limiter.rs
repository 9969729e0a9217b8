//! Token-bucket rate limiter shared by all workers.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Global transaction-rate limiter.
///
/// Refills continuously at `target_rate` tokens per second up to a burst of
/// twice the rate. A non-positive rate disables limiting.
#[derive(Debug)]
pub struct RateLimiter {
    target_rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(target_rate: f64) -> Self {
        let target_rate = if target_rate.is_finite() {
            target_rate.max(0.0)
        } else {
            0.0
        };
        Self {
            target_rate,
            burst: target_rate * 2.0,
            bucket: Mutex::new(Bucket {
                tokens: target_rate,
                last_refill: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.target_rate > 0.0
    }

    #[must_use]
    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    /// Tokens currently available, after refilling.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Take one token, waiting up to `timeout` for it.
    ///
    /// Returns `false` if no token became available in time.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Take one token if available without waiting.
    pub fn try_acquire(&self) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.target_rate).min(self.burst);
        bucket.last_refill = now;
    }
}

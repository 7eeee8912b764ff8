//! @ai:module:intent Rate limiting for outbound LLM requests
//! @ai:module:layer infrastructure
//! @ai:module:public_api RateLimiter, RateLimiterTrait
//! @ai:module:stateless false

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// @ai:intent Trait for rate limiting functionality
pub trait RateLimiterTrait: Send + Sync {
    /// @ai:intent Wait until a request is allowed
    fn wait(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// @ai:intent Token bucket shared by every concurrent caller of one client
///
/// A limit of zero requests per minute disables throttling.
pub struct RateLimiter {
    bucket: Option<Mutex<Bucket>>,
}

struct Bucket {
    capacity: f64,
    tokens_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    /// @ai:intent Refill tokens for the time elapsed since the last refill
    /// @ai:effects state:write, time
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.tokens_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// @ai:intent Take a token, or report how long until one is available
    /// @ai:effects state:write
    fn try_take(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - self.tokens) / self.tokens_per_sec))
        }
    }
}

impl RateLimiter {
    /// @ai:intent Create a limiter allowing a burst of `requests_per_minute` then a steady rate
    /// @ai:effects pure
    pub fn new(requests_per_minute: u32) -> Self {
        if requests_per_minute == 0 {
            return Self::unlimited();
        }

        let capacity = requests_per_minute as f64;
        Self {
            bucket: Some(Mutex::new(Bucket {
                capacity,
                tokens_per_sec: capacity / 60.0,
                tokens: capacity,
                last_refill: Instant::now(),
            })),
        }
    }

    /// @ai:intent Create a limiter that never waits
    /// @ai:effects pure
    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    pub fn is_unlimited(&self) -> bool {
        self.bucket.is_none()
    }
}

impl RateLimiterTrait for RateLimiter {
    /// @ai:intent Wait until a request is allowed
    /// @ai:effects state:write, time
    async fn wait(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        loop {
            let pause = bucket.lock().await.try_take(Instant::now());
            match pause {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let limiter = RateLimiter::new(60);

        let start = Instant::now();
        for _ in 0..60 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttles_after_burst() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            limiter.wait().await;
        }

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_is_unlimited() {
        let limiter = RateLimiter::new(0);
        assert!(limiter.is_unlimited());

        let start = Instant::now();
        for _ in 0..1_000 {
            limiter.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

//! Token-bucket limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Seconds in one refill window; `rate_limit` tokens accrue per window.
const WINDOW_SECS: f64 = 60.0;

#[derive(Debug)]
struct Bucket {
    /// Available tokens, a continuous value in `[0, rate_limit]`.
    tokens: f64,
    /// Timestamp of the last refill computation.
    last_refill: Instant,
}

/// Token-bucket limiter smoothing calls to a named resource to at most
/// `rate_limit` per 60-second window.
///
/// The bucket starts with a single token: the first call goes through
/// immediately, subsequent back-to-back calls are paced at the refill rate.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    rate_limit: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter for the named resource.
    ///
    /// Fails fast when `requests_per_minute` is zero, negative or NaN.
    pub fn new(
        name: impl Into<String>,
        requests_per_minute: f64,
    ) -> Result<Arc<Self>, ConfigError> {
        if !(requests_per_minute > 0.0) {
            return Err(ConfigError::NonPositiveRate(requests_per_minute));
        }
        Ok(Self::new_unchecked(name, requests_per_minute))
    }

    pub(crate) fn new_unchecked(name: impl Into<String>, requests_per_minute: f64) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            rate_limit: requests_per_minute,
            bucket: Mutex::new(Bucket {
                tokens: requests_per_minute.min(1.0),
                last_refill: Instant::now(),
            }),
        })
    }

    /// Name of the guarded resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured tokens per 60-second window.
    pub fn rate_limit(&self) -> f64 {
        self.rate_limit
    }

    /// Suspend until a token is available, then consume it.
    ///
    /// The internal lock is never held while suspended, and the token is
    /// consumed only after the wait completes: a caller that abandons the
    /// wait leaves the bucket untouched. Waking re-checks availability,
    /// since concurrent callers may have drained the refill.
    pub async fn wait_for_token(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    debug!(name = %self.name, tokens = bucket.tokens, "token acquired");
                    return;
                }
                let deficit = 1.0 - bucket.tokens;
                Duration::from_secs_f64(deficit * WINDOW_SECS / self.rate_limit)
                    // never sleep zero; a truncated deficit would spin
                    .max(Duration::from_millis(1))
            };
            warn!(
                name = %self.name,
                wait_ms = wait.as_millis() as u64,
                "rate limited, waiting for token"
            );
            sleep(wait).await;
        }
    }

    /// Consume a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refill. Diagnostic only.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate_limit / WINDOW_SECS)
            .min(self.rate_limit);
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test]
    async fn test_rejects_non_positive_rate() {
        assert!(matches!(
            RateLimiter::new("test", 0.0),
            Err(ConfigError::NonPositiveRate(_))
        ));
        assert!(matches!(
            RateLimiter::new("test", -5.0),
            Err(ConfigError::NonPositiveRate(_))
        ));
        assert!(RateLimiter::new("test", 0.5).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new("test", 60.0).unwrap();
        let start = Instant::now();
        limiter.wait_for_token().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_are_paced() {
        // 60 rpm = 1 token/sec; five calls must take at least ~4 seconds
        let limiter = RateLimiter::new("test", 60.0).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait_for_token().await;
        }
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(4), "elapsed: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "elapsed: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_does_not_wait() {
        let limiter = RateLimiter::new("test", 2.0).unwrap();
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        // half a window refills one token at 2 rpm
        advance(Duration::from_secs(30)).await;
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_rate_limit() {
        let limiter = RateLimiter::new("test", 10.0).unwrap();
        advance(Duration::from_secs(3600)).await;
        assert!(limiter.available() <= 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumption_bounded_by_refill_rate() {
        // with the bucket drained, a window of W seconds admits at most
        // rate * W / 60 calls
        let limiter = RateLimiter::new("test", 60.0).unwrap();
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        advance(Duration::from_secs(10)).await;
        let mut admitted = 0;
        while limiter.try_acquire() {
            admitted += 1;
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_negative() {
        let limiter = RateLimiter::new("test", 60.0).unwrap();
        limiter.wait_for_token().await;
        assert!(limiter.available() >= 0.0);
        limiter.wait_for_token().await;
        assert!(limiter.available() >= 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_consumes_nothing() {
        let limiter = RateLimiter::new("test", 60.0).unwrap();
        assert!(limiter.try_acquire());

        // cancel a waiter halfway through its suspension
        tokio::select! {
            _ = limiter.wait_for_token() => panic!("wait should not complete in 500ms"),
            _ = sleep(Duration::from_millis(500)) => {}
        }

        // the token that accrued during the wait is still there
        advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_rate_paces_slow_resources() {
        // 0.5 rpm = one call every two minutes
        let limiter = RateLimiter::new("test", 0.5).unwrap();
        let start = Instant::now();
        limiter.wait_for_token().await;
        limiter.wait_for_token().await;
        assert!(Instant::now() - start >= Duration::from_secs(120));
    }
}

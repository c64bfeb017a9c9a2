//! Token-bucket rate limiter with stepped refill.
//!
//! The bucket holds at most `rate` tokens. Once a full `interval` has passed
//! since the last refill, the next caller refills it to `rate` in one step.
//! Tokens are not interpolated between refills, so traffic is bursty at
//! interval boundaries but `allow()` never admits more than `rate` calls in a
//! single window.

use super::{duration_nanos, nanos_since};
use crate::config::RateLimiterConfig;
use crate::context::Context;
use crate::error::{ConfigError, ContextError};
use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// A lock-free token bucket.
///
/// # Example
///
/// ```
/// use cmdhint_core::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(2, Duration::from_secs(60));
/// assert!(limiter.allow());
/// assert!(limiter.allow());
/// assert!(!limiter.allow());
/// ```
pub struct RateLimiter {
    tokens: AtomicU64,
    rate: u64,
    interval: Duration,
    interval_nanos: u64,
    epoch: Instant,
    /// Nanoseconds since `epoch` of the last refill.
    last_refill: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter admitting `rate` calls per `interval`, starting full.
    ///
    /// A zero `rate` admits nothing; a zero `interval` is treated as one
    /// nanosecond.
    pub fn new(rate: u64, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_nanos(1));
        Self {
            tokens: AtomicU64::new(rate),
            rate,
            interval,
            interval_nanos: duration_nanos(interval),
            epoch: Instant::now(),
            last_refill: AtomicU64::new(0),
        }
    }

    /// Creates a limiter from a validated configuration.
    pub fn init(config: RateLimiterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.rate, config.interval))
    }

    /// Refills the bucket if a full interval has elapsed.
    ///
    /// Only the caller that wins the swap on `last_refill` refills.
    fn refill(&self) {
        let now = nanos_since(self.epoch, Instant::now());
        let last = self.last_refill.load(Ordering::Acquire);
        if now.saturating_sub(last) < self.interval_nanos {
            return;
        }
        if self
            .last_refill
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.tokens.store(self.rate, Ordering::Release);
        }
    }

    /// Takes a token if one is available.
    pub fn allow(&self) -> bool {
        self.refill();
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| t.checked_sub(1))
            .is_ok()
    }

    /// Blocks until a token is available or `ctx` is done.
    ///
    /// Polls [`allow`](Self::allow) every `interval / 10`, never sleeping past
    /// the context deadline.
    pub fn wait(&self, ctx: &Context) -> Result<(), ContextError> {
        let backoff = (self.interval / 10).max(Duration::from_micros(100));
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            if self.allow() {
                return Ok(());
            }
            let pause = ctx.remaining().map_or(backoff, |left| left.min(backoff));
            thread::sleep(pause);
        }
    }

    /// Tokens left in the current window (refilling first if due).
    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::Acquire)
    }

    /// Tokens granted per interval.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Refill interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("interval", &self.interval)
            .field("tokens", &self.tokens.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_bucket_drains_then_refuses() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert_eq!(limiter.available(), 3);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
        assert_eq!(limiter.available(), 0);
    }

    #[test]
    fn test_refills_after_interval() {
        let limiter = RateLimiter::new(2, Duration::from_millis(20));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        thread::sleep(Duration::from_millis(30));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn test_refill_does_not_accumulate() {
        let limiter = RateLimiter::new(2, Duration::from_millis(10));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(limiter.available(), 2);
    }

    #[test]
    fn test_zero_rate_admits_nothing() {
        let limiter = RateLimiter::new(0, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(2));
        assert!(!limiter.allow());
    }

    #[test]
    fn test_concurrent_callers_respect_rate() {
        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let admitted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    for _ in 0..100 {
                        if limiter.allow() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_wait_returns_on_deadline() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow());
        let ctx = Context::new().with_timeout(Duration::from_millis(30));
        let started = Instant::now();
        assert_eq!(limiter.wait(&ctx), Err(ContextError::DeadlineExceeded));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_returns_on_cancel() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow());
        let ctx = Context::new();
        let canceller = ctx.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        assert_eq!(limiter.wait(&ctx), Err(ContextError::Cancelled));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_gets_token_after_refill() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.allow());
        let ctx = Context::new().with_timeout(Duration::from_secs(5));
        assert_eq!(limiter.wait(&ctx), Ok(()));
    }

    #[test]
    fn test_init_validates() {
        let config = RateLimiterConfig {
            rate: 0,
            interval: Duration::from_secs(1),
        };
        assert!(RateLimiter::init(config).is_err());
    }
}

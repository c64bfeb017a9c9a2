//! Admission control and failure isolation for outbound calls.
//!
//! Both utilities are lock-free and meant to wrap calls to external sources
//! before they reach a pool or the cache:
//!
//! ```text
//!   caller ──▶ RateLimiter::wait ──▶ CircuitBreaker::execute ──▶ source
//! ```
//!
//! Neither retries. Retry policy belongs to the caller, which composes
//! [`RateLimiter::wait`] with [`CircuitBreaker::execute`] as it sees fit.

mod circuit_breaker;
mod rate_limiter;

pub use self::circuit_breaker::{CircuitBreaker, CircuitState};
pub use self::rate_limiter::RateLimiter;

use std::time::{Duration, Instant};

/// Nanoseconds from `epoch` to `at`, saturating at `u64::MAX`.
#[inline]
pub(crate) fn nanos_since(epoch: Instant, at: Instant) -> u64 {
    u64::try_from(at.saturating_duration_since(epoch).as_nanos()).unwrap_or(u64::MAX)
}

/// `Duration` as nanoseconds, saturating at `u64::MAX`.
#[inline]
pub(crate) fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

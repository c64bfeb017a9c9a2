//! Three-state circuit breaker.
//!
//! ```text
//!            failures >= threshold
//!   Closed ───────────────────────▶ Open
//!     ▲                              │
//!     │ success        timeout since │ (checked lazily by state())
//!     │                last failure  ▼
//!     └──────────────────────── HalfOpen
//!                                    │ failure
//!                                    └──────▶ Open
//! ```
//!
//! State lives in atomics. The Open to HalfOpen flip is a compare-and-swap,
//! so exactly one caller performs it and logs it.

use super::{duration_nanos, nanos_since};
use crate::config::CircuitBreakerConfig;
use crate::error::{BreakerError, ConfigError};
use core::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Breaker state as seen by [`CircuitBreaker::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CircuitState {
    /// Calls go through.
    Closed,
    /// Calls fail fast without running.
    Open,
    /// The timeout passed; the next call decides whether to close or reopen.
    HalfOpen,
}

impl CircuitState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            OPEN => CircuitState::Open,
            HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Fails fast once a wrapped operation keeps failing.
///
/// # Example
///
/// ```
/// use cmdhint_core::{BreakerError, CircuitBreaker, CircuitState};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
///
/// for _ in 0..2 {
///     let _ = breaker.execute(|| Err::<(), _>("connection refused"));
/// }
/// assert_eq!(breaker.state(), CircuitState::Open);
///
/// let result = breaker.execute(|| Ok::<_, &str>("never runs"));
/// assert!(matches!(result, Err(BreakerError::Open)));
/// ```
pub struct CircuitBreaker {
    state: AtomicU8,
    failures: AtomicU32,
    threshold: u32,
    timeout: Duration,
    timeout_nanos: u64,
    epoch: Instant,
    /// Nanoseconds since `epoch` of the most recent failure.
    last_failure: AtomicU64,
}

impl CircuitBreaker {
    /// Creates a closed breaker that opens after `threshold` consecutive
    /// failures and half-opens `timeout` after the last one.
    ///
    /// A zero `threshold` is treated as one.
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            state: AtomicU8::new(CLOSED),
            failures: AtomicU32::new(0),
            threshold: threshold.max(1),
            timeout,
            timeout_nanos: duration_nanos(timeout),
            epoch: Instant::now(),
            last_failure: AtomicU64::new(0),
        }
    }

    /// Creates a breaker from a validated configuration.
    pub fn init(config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.failure_threshold, config.timeout))
    }

    #[inline]
    fn now_nanos(&self) -> u64 {
        nanos_since(self.epoch, Instant::now())
    }

    /// Current state, moving Open to HalfOpen if the timeout has passed.
    pub fn state(&self) -> CircuitState {
        let raw = self.state.load(Ordering::Acquire);
        if raw != OPEN {
            return CircuitState::from_u8(raw);
        }
        let since_failure = self
            .now_nanos()
            .saturating_sub(self.last_failure.load(Ordering::Acquire));
        if since_failure < self.timeout_nanos {
            return CircuitState::Open;
        }
        match self
            .state
            .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!(timeout = ?self.timeout, "circuit half-open");
                CircuitState::HalfOpen
            }
            Err(actual) => CircuitState::from_u8(actual),
        }
    }

    /// Runs `operation` unless the breaker is open.
    ///
    /// # Errors
    ///
    /// [`BreakerError::Open`] without running `operation` when open, or
    /// [`BreakerError::Failed`] with the operation's own error.
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if self.state() == CircuitState::Open {
            return Err(BreakerError::Open);
        }
        match operation() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Failed(e))
            }
        }
    }

    fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        let previous = self.state.swap(CLOSED, Ordering::AcqRel);
        if previous != CLOSED {
            info!("circuit closed");
        }
    }

    fn record_failure(&self) {
        self.last_failure.store(self.now_nanos(), Ordering::Release);
        let failures = self.failures.fetch_add(1, Ordering::AcqRel).saturating_add(1);

        let tripped = if self.state.load(Ordering::Acquire) == HALF_OPEN {
            self.state
                .compare_exchange(HALF_OPEN, OPEN, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        } else if failures >= self.threshold {
            self.state
                .compare_exchange(CLOSED, OPEN, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        } else {
            false
        };
        if tripped {
            info!(failures, threshold = self.threshold, "circuit opened");
        }
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Failures needed to open the breaker.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// How long the breaker stays open after the last failure.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forces the breaker closed and clears the failure count.
    pub fn reset(&self) {
        self.record_success();
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field(
                "state",
                &CircuitState::from_u8(self.state.load(Ordering::Relaxed)),
            )
            .field("failures", &self.failures())
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .finish()
    }
}

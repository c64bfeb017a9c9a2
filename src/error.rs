//! Error types shared by the cache, pools and resilience utilities.
//!
//! Cache lookups never fail: a miss is an `Option::None`, not an error. The
//! types here cover the remaining failure classes:
//!
//! | Class | Type | Recoverable by |
//! |-------|------|----------------|
//! | Back-pressure (queue full, pool inactive) | [`PoolError::QueueFull`], [`PoolError::Inactive`] | retry, drop or escalate |
//! | Task fault | [`PoolError::Task`], [`PoolError::Panicked`] | caller decides |
//! | Closed resource | [`PoolError::Stopped`], [`PoolError::Cancelled`] | build a new pool |
//! | Fail-fast | [`BreakerError::Open`] | wait for the breaker timeout |
//! | Deadline / cancellation | [`ContextError`] | caller decides |
//!
//! Nothing in this crate retries on its own.

use std::io;
use thiserror::Error;

/// Boxed error returned by failing tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the worker pools.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The task queue is at capacity.
    #[error("task queue is full")]
    QueueFull,

    /// The pool has not been started, or has already been stopped.
    #[error("pool is not active")]
    Inactive,

    /// `start()` was called on a pool that was already stopped.
    #[error("pool was stopped and cannot be restarted")]
    Stopped,

    /// The pool stopped before the task reported a result.
    #[error("pool stopped before the task completed")]
    Cancelled,

    /// The task ran and returned an error.
    #[error("task failed: {0}")]
    Task(#[source] BoxError),

    /// The task panicked; the payload message is preserved.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// The pool configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field that must be non-zero was zero.
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),

    /// A field holds a value that is inconsistent with the rest of the config.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Error returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
///
/// `Open` means the wrapped operation was never invoked.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open and failed fast.
    #[error("circuit open")]
    Open,

    /// The wrapped operation ran and failed.
    #[error("operation failed: {0}")]
    Failed(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns the inner error, if the operation actually ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Failed(e) => Some(e),
        }
    }
}

/// Why a [`Context`](crate::Context) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context (or one of its ancestors) was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl From<ContextError> for PoolError {
    fn from(_: ContextError) -> Self {
        PoolError::Cancelled
    }
}

//! Configuration for the worker pools.
//!
//! All three pools bound their queues: a full queue is reported to the caller
//! as back-pressure instead of blocking or growing.
//!
//! | Config | Workers | Queue |
//! |--------|---------|-------|
//! | [`WorkerPoolConfig`] | fixed `workers` | ring buffer, `queue_size` rounded to a power of two |
//! | [`AdaptivePoolConfig`] | `min_workers..=max_workers` | bounded channel of `queue_size` |
//! | [`PriorityPoolConfig`] | fixed `workers` | three bounded channels of `queue_capacity` each |

use crate::error::ConfigError;
use core::fmt;
use std::time::Duration;

/// Configuration for a fixed-size [`WorkerPool`](crate::WorkerPool).
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Queue capacity; rounded up to the next power of two.
    pub queue_size: usize,
}

impl WorkerPoolConfig {
    /// Checks the config for values that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Zero("queue_size"));
        }
        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: super::available_parallelism(),
            queue_size: 1024,
        }
    }
}

impl fmt::Debug for WorkerPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolConfig")
            .field("workers", &self.workers)
            .field("queue_size", &self.queue_size)
            .finish()
    }
}

/// Configuration for an [`AdaptivePool`](crate::AdaptivePool).
///
/// The pool starts `min_workers` threads, grows by one whenever the queue is
/// more than half full (up to `max_workers`), and lets a worker exit after
/// `idle_timeout` without work while more than `min_workers` are alive.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdaptivePoolConfig {
    /// Workers kept alive even when idle. Must be at least one.
    pub min_workers: usize,
    /// Hard upper bound on live workers.
    pub max_workers: usize,
    /// Capacity of the shared task channel.
    pub queue_size: usize,
    /// How long a worker waits for work before considering exit.
    pub idle_timeout: Duration,
}

impl AdaptivePoolConfig {
    /// Checks the config for values that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::Zero("min_workers"));
        }
        if self.max_workers < self.min_workers {
            return Err(ConfigError::Invalid {
                field: "max_workers",
                reason: "must be at least min_workers",
            });
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Zero("queue_size"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Zero("idle_timeout"));
        }
        Ok(())
    }
}

impl Default for AdaptivePoolConfig {
    fn default() -> Self {
        let cpus = super::available_parallelism();
        Self {
            min_workers: 1,
            max_workers: cpus * 2,
            queue_size: 256,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for AdaptivePoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptivePoolConfig")
            .field("min_workers", &self.min_workers)
            .field("max_workers", &self.max_workers)
            .field("queue_size", &self.queue_size)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Configuration for a [`PriorityPool`](crate::PriorityPool).
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriorityPoolConfig {
    /// Number of worker threads shared by all three priorities.
    pub workers: usize,
    /// Capacity of each of the high, medium and low queues.
    pub queue_capacity: usize,
}

impl PriorityPoolConfig {
    /// Checks the config for values that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        Ok(())
    }
}

impl Default for PriorityPoolConfig {
    fn default() -> Self {
        Self {
            workers: super::available_parallelism(),
            queue_capacity: 256,
        }
    }
}

impl fmt::Debug for PriorityPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityPoolConfig")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

//! Worker pools.
//!
//! Three scheduling policies share one task model:
//!
//! | Pool | Queue | Workers | Use it for |
//! |------|-------|---------|------------|
//! | [`WorkerPool`] | [`RingBuffer`](crate::RingBuffer), busy-polled | fixed | latency-sensitive fan-out |
//! | [`AdaptivePool`] | bounded channel | `min..=max`, grows under load, shrinks when idle | bursty background work |
//! | [`PriorityPool`] | three bounded channels | fixed | work with strict precedence |
//!
//! Every pool:
//!
//! - accepts work without blocking; a full queue or an inactive pool is
//!   reported to the caller ([`PoolError::QueueFull`], [`PoolError::Inactive`])
//!   and nothing is retried;
//! - runs each task under `catch_unwind`, turning its result into an
//!   [`Outcome`], so a failing or panicking task never takes a worker down;
//! - hands each task the pool's [`Context`](crate::Context), which `stop()`
//!   cancels;
//! - on `stop()`, rejects new work, lets workers finish what is already
//!   queued, and joins every worker thread. Dropping a pool stops it.
//!
//! Pools are started and stopped once. Starting a stopped [`WorkerPool`] is
//! rejected with [`PoolError::Stopped`].
//!
//! [`PoolError::QueueFull`]: crate::PoolError::QueueFull
//! [`PoolError::Inactive`]: crate::PoolError::Inactive
//! [`PoolError::Stopped`]: crate::PoolError::Stopped

mod adaptive;
mod fanout;
mod fixed;
mod priority;
mod task;

pub use self::adaptive::AdaptivePool;
pub use self::fanout::{fan_out, FanOut};
pub use self::fixed::WorkerPool;
pub use self::priority::{Priority, PriorityPool};
pub use self::task::{Outcome, Task, TaskResult};

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Worker count: configured for fixed-size pools, live for an adaptive pool.
    pub workers: usize,
    /// Tasks waiting in the queue (all priorities for a [`PriorityPool`]).
    pub queue_size: usize,
    /// Total queue capacity.
    pub capacity: usize,
    /// Whether the pool currently accepts work.
    pub active: bool,
    /// Tasks that returned `Ok(())`.
    pub completed: u64,
    /// Tasks that returned an error.
    pub failed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
}

/// Outcome tallies shared by a pool's workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    pub(crate) fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Completed => &self.completed,
            Outcome::Failed(_) => &self.failed,
            Outcome::Panicked(_) => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fills the outcome fields of `stats`.
    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.completed = self.completed.load(Ordering::Relaxed);
        stats.failed = self.failed.load(Ordering::Relaxed);
        stats.panicked = self.panicked.load(Ordering::Relaxed);
    }
}

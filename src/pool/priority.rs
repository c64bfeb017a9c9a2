//! Fixed pool with three strictly ordered queues.
//!
//! A worker always takes from the highest non-empty queue. There is no aging
//! and no fairness between levels: a steady stream of high-priority work
//! starves medium and low indefinitely. Callers that need a share guarantee
//! must ration their own high-priority submissions.

use super::task::{panic_message, run_isolated, BoxTask, Task};
use super::{Counters, PoolStats};
use crate::config::PriorityPoolConfig;
use crate::context::Context;
use crate::error::PoolError;
use core::fmt;
use crossbeam_channel::{Receiver, Select, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Queue a task is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Priority {
    /// Drained before anything else.
    High,
    /// Served when no high-priority task is waiting.
    Medium,
    /// Served only when both other queues are empty.
    Low,
}

impl Priority {
    /// All levels, highest first.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    #[inline]
    fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Medium => f.write_str("medium"),
            Priority::Low => f.write_str("low"),
        }
    }
}

struct Shared {
    senders: [Sender<BoxTask>; 3],
    receivers: [Receiver<BoxTask>; 3],
    shutdown: Receiver<()>,
    active: AtomicBool,
    ctx: Context,
    counters: Counters,
}

impl Shared {
    /// Pops from the highest non-empty queue.
    fn next_task(&self) -> Option<BoxTask> {
        self.receivers.iter().find_map(|rx| rx.try_recv().ok())
    }

    fn work(&self, id: usize) {
        debug!(worker = id, "priority worker started");
        loop {
            if let Some(task) = self.next_task() {
                let outcome = run_isolated(task, &self.ctx, |payload| {
                    warn!(panic = %panic_message(payload), "task panicked");
                });
                self.counters.record(&outcome);
                continue;
            }

            // Park until something is ready. Readiness does not consume, so
            // the next pass still honours priority order.
            let mut sel = Select::new();
            for rx in &self.receivers {
                sel.recv(rx);
            }
            let shutdown = sel.recv(&self.shutdown);
            if sel.ready() == shutdown && self.pending_total() == 0 {
                break;
            }
        }
        debug!(worker = id, "priority worker exited");
    }

    fn pending_total(&self) -> usize {
        self.receivers.iter().map(Receiver::len).sum()
    }
}

/// A fixed pool serving high, medium and low queues in strict order.
///
/// # Example
///
/// ```
/// use cmdhint_core::{Context, Priority, PriorityPool};
///
/// let pool = PriorityPool::new(2, 16).unwrap();
/// assert!(pool.submit_high(|_: &Context| Ok(())));
/// assert!(pool.submit(Priority::Low, |_: &Context| Ok(())));
/// pool.stop();
/// assert_eq!(pool.stats().completed, 2);
/// ```
pub struct PriorityPool {
    shared: Arc<Shared>,
    workers: usize,
    queue_capacity: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Mutex<Option<Sender<()>>>,
}

impl PriorityPool {
    /// Creates a pool with `workers` threads and `queue_capacity` slots per level.
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        Self::init(PriorityPoolConfig {
            workers,
            queue_capacity,
        })
    }

    /// Creates a pool from a configuration and starts its workers.
    pub fn init(config: PriorityPoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let (high_tx, high_rx) = crossbeam_channel::bounded(config.queue_capacity);
        let (medium_tx, medium_rx) = crossbeam_channel::bounded(config.queue_capacity);
        let (low_tx, low_rx) = crossbeam_channel::bounded(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);

        let pool = Self {
            shared: Arc::new(Shared {
                senders: [high_tx, medium_tx, low_tx],
                receivers: [high_rx, medium_rx, low_rx],
                shutdown: shutdown_rx,
                active: AtomicBool::new(true),
                ctx: Context::new(),
                counters: Counters::default(),
            }),
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            handles: Mutex::new(Vec::with_capacity(config.workers)),
            shutdown: Mutex::new(Some(shutdown_tx)),
        };

        {
            let mut handles = pool.handles.lock();
            for id in 0..config.workers {
                let shared = Arc::clone(&pool.shared);
                let handle = thread::Builder::new()
                    .name(format!("cmdhint-priority-{}", id))
                    .spawn(move || shared.work(id))?;
                handles.push(handle);
            }
        }
        debug!(?config, "priority pool started");
        Ok(pool)
    }

    /// Queues `task` at `priority`. Returns `false` on back-pressure.
    pub fn submit<T: Task>(&self, priority: Priority, task: T) -> bool {
        self.try_submit(priority, task).is_ok()
    }

    /// Queues `task` at `priority` without blocking.
    pub fn try_submit<T: Task>(&self, priority: Priority, task: T) -> Result<(), PoolError> {
        if !self.shared.active.load(Ordering::Acquire) {
            return Err(PoolError::Inactive);
        }
        self.shared.senders[priority.index()]
            .try_send(Box::new(task))
            .map_err(|e| match e {
                TrySendError::Full(_) => PoolError::QueueFull,
                TrySendError::Disconnected(_) => PoolError::Inactive,
            })
    }

    /// Queues `task` on the high-priority queue.
    pub fn submit_high<T: Task>(&self, task: T) -> bool {
        self.submit(Priority::High, task)
    }

    /// Queues `task` on the medium-priority queue.
    pub fn submit_medium<T: Task>(&self, task: T) -> bool {
        self.submit(Priority::Medium, task)
    }

    /// Queues `task` on the low-priority queue.
    pub fn submit_low<T: Task>(&self, task: T) -> bool {
        self.submit(Priority::Low, task)
    }

    /// Tasks waiting at `priority`.
    pub fn pending(&self, priority: Priority) -> usize {
        self.shared.receivers[priority.index()].len()
    }

    /// Stops accepting work, lets workers drain every queue, and joins them.
    ///
    /// Safe to call more than once.
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
        self.shared.ctx.cancel();
        drop(self.shutdown.lock().take());
        let handles = core::mem::take(&mut *self.handles.lock());
        let joined = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                warn!("priority worker panicked outside a task");
            }
        }
        if joined > 0 {
            debug!(joined, "priority pool stopped");
        }
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Snapshot of the pool's size, queues and outcome counters.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            workers: self.workers,
            queue_size: self.shared.pending_total(),
            capacity: self.queue_capacity * Priority::ALL.len(),
            active: self.is_active(),
            ..PoolStats::default()
        };
        self.shared.counters.fill(&mut stats);
        stats
    }
}

impl Drop for PriorityPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PriorityPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityPool")
            .field("workers", &self.workers)
            .field("high", &self.pending(Priority::High))
            .field("medium", &self.pending(Priority::Medium))
            .field("low", &self.pending(Priority::Low))
            .finish()
    }
}

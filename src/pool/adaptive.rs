//! Elastic pool that grows under load and shrinks when idle.
//!
//! ```text
//!             submit ──▶ [ bounded channel ] ──▶ workers (min..=max)
//!                              │
//!           occupancy > cap/2 ─┘──▶ spawn one more (if below max)
//!
//!   worker idle for `idle_timeout` ──▶ exit (if above min)
//! ```
//!
//! Scale-up increments the worker count under the handle lock before the
//! thread is spawned, so concurrent submitters never overshoot `max`.
//! Scale-down claims its slot with a compare-and-swap on the worker count and
//! only exits if the swap succeeded while the count was above `min`, so a
//! wave of idle timeouts cannot take the pool below `min`.

use super::task::{panic_message, run_isolated, BoxTask, Task};
use super::{Counters, PoolStats};
use crate::config::AdaptivePoolConfig;
use crate::context::Context;
use crate::error::PoolError;
use core::fmt;
use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

struct Shared {
    tx: Sender<BoxTask>,
    rx: Receiver<BoxTask>,
    shutdown: Receiver<()>,
    current: AtomicUsize,
    peak: AtomicUsize,
    next_id: AtomicUsize,
    min: usize,
    max: usize,
    idle_timeout: Duration,
    active: AtomicBool,
    ctx: Context,
    counters: Counters,
}

impl Shared {
    fn run(&self, task: BoxTask) {
        let outcome = run_isolated(task, &self.ctx, |payload| {
            warn!(panic = %panic_message(payload), "task panicked");
        });
        self.counters.record(&outcome);
    }

    /// Gives up this worker's slot if that keeps the pool at or above `min`.
    fn try_retire(&self) -> bool {
        let mut current = self.current.load(Ordering::Acquire);
        while current > self.min {
            match self.current.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    fn work(&self, id: usize) {
        debug!(worker = id, "adaptive worker started");
        loop {
            select! {
                recv(self.rx) -> task => match task {
                    Ok(task) => self.run(task),
                    Err(_) => break,
                },
                recv(self.shutdown) -> _ => {
                    while let Ok(task) = self.rx.try_recv() {
                        self.run(task);
                    }
                    break;
                },
                default(self.idle_timeout) => {
                    if self.try_retire() {
                        debug!(worker = id, "adaptive worker retired after idle timeout");
                        return;
                    }
                },
            }
        }
        self.current.fetch_sub(1, Ordering::AcqRel);
        debug!(worker = id, "adaptive worker exited");
    }
}

/// A pool whose worker count follows the load between `min` and `max`.
///
/// Workers start at construction; there is no separate `start()`.
///
/// # Example
///
/// ```
/// use cmdhint_core::{AdaptivePool, Context};
/// use std::time::Duration;
///
/// let pool = AdaptivePool::new(1, 4, 32, Duration::from_millis(100)).unwrap();
/// assert_eq!(pool.current_workers(), 1);
///
/// assert!(pool.submit(|_: &Context| Ok(())));
/// pool.stop();
/// assert_eq!(pool.current_workers(), 0);
/// ```
pub struct AdaptivePool {
    shared: Arc<Shared>,
    capacity: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Mutex<Option<Sender<()>>>,
}

impl AdaptivePool {
    /// Creates a pool and starts `min_workers` workers.
    ///
    /// # Errors
    ///
    /// [`PoolError::Config`] for inconsistent bounds, [`PoolError::Spawn`] if
    /// a worker thread could not be created.
    pub fn new(
        min_workers: usize,
        max_workers: usize,
        queue_size: usize,
        idle_timeout: Duration,
    ) -> Result<Self, PoolError> {
        Self::init(AdaptivePoolConfig {
            min_workers,
            max_workers,
            queue_size,
            idle_timeout,
        })
    }

    /// Creates a pool from a configuration and starts `min_workers` workers.
    pub fn init(config: AdaptivePoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let (tx, rx) = crossbeam_channel::bounded(config.queue_size);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        let pool = Self {
            shared: Arc::new(Shared {
                tx,
                rx,
                shutdown: shutdown_rx,
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                next_id: AtomicUsize::new(0),
                min: config.min_workers,
                max: config.max_workers,
                idle_timeout: config.idle_timeout,
                active: AtomicBool::new(true),
                ctx: Context::new(),
                counters: Counters::default(),
            }),
            capacity: config.queue_size,
            handles: Mutex::new(Vec::with_capacity(config.max_workers)),
            shutdown: Mutex::new(Some(shutdown_tx)),
        };

        {
            let mut handles = pool.handles.lock();
            for _ in 0..config.min_workers {
                let handle = pool.spawn_worker()?;
                handles.push(handle);
            }
        }
        debug!(?config, "adaptive pool started");
        Ok(pool)
    }

    /// Reserves a slot in `current` and spawns a worker for it.
    ///
    /// Callers hold the handle lock.
    fn spawn_worker(&self) -> Result<JoinHandle<()>, PoolError> {
        let count = self.shared.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.peak.fetch_max(count, Ordering::Relaxed);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("cmdhint-adaptive-{}", id))
            .spawn(move || shared.work(id))
            .map_err(|e| {
                self.shared.current.fetch_sub(1, Ordering::AcqRel);
                PoolError::Spawn(e)
            })
    }

    /// Queues `task` without blocking. Returns `false` on back-pressure.
    pub fn submit<T: Task>(&self, task: T) -> bool {
        self.try_submit(task).is_ok()
    }

    /// Queues `task` without blocking, then checks whether to add a worker.
    pub fn try_submit<T: Task>(&self, task: T) -> Result<(), PoolError> {
        if !self.shared.active.load(Ordering::Acquire) {
            return Err(PoolError::Inactive);
        }
        self.shared
            .tx
            .try_send(Box::new(task))
            .map_err(|e| match e {
                TrySendError::Full(_) => PoolError::QueueFull,
                TrySendError::Disconnected(_) => PoolError::Inactive,
            })?;
        self.maybe_scale_up();
        Ok(())
    }

    fn maybe_scale_up(&self) {
        if self.shared.rx.len() <= self.capacity / 2 {
            return;
        }
        let mut handles = self.handles.lock();
        if !self.shared.active.load(Ordering::Acquire)
            || self.shared.current.load(Ordering::Acquire) >= self.shared.max
        {
            return;
        }
        handles.retain(|h| !h.is_finished());
        match self.spawn_worker() {
            Ok(handle) => {
                handles.push(handle);
                debug!(
                    workers = self.shared.current.load(Ordering::Relaxed),
                    queued = self.shared.rx.len(),
                    "adaptive pool scaled up"
                );
            }
            Err(e) => warn!(error = %e, "failed to scale up adaptive pool"),
        }
    }

    /// Stops accepting work, lets workers drain the queue, and joins them all.
    ///
    /// Safe to call more than once.
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
        self.shared.ctx.cancel();
        let handles = {
            let mut handles = self.handles.lock();
            // Disconnecting the shutdown channel wakes every worker.
            drop(self.shutdown.lock().take());
            core::mem::take(&mut *handles)
        };
        let joined = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                warn!("adaptive worker panicked outside a task");
            }
        }
        if joined > 0 {
            debug!(joined, "adaptive pool stopped");
        }
    }

    /// Workers currently alive.
    pub fn current_workers(&self) -> usize {
        self.shared.current.load(Ordering::Acquire)
    }

    /// Highest worker count reached so far.
    pub fn peak_workers(&self) -> usize {
        self.shared.peak.load(Ordering::Relaxed)
    }

    /// Tasks waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.rx.len()
    }

    /// Lower bound on the worker count.
    pub fn min_workers(&self) -> usize {
        self.shared.min
    }

    /// Upper bound on the worker count.
    pub fn max_workers(&self) -> usize {
        self.shared.max
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Snapshot of the pool's size, queue and outcome counters.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            workers: self.current_workers(),
            queue_size: self.pending(),
            capacity: self.capacity,
            active: self.is_active(),
            ..PoolStats::default()
        };
        self.shared.counters.fill(&mut stats);
        stats
    }
}

impl Drop for AdaptivePool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for AdaptivePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptivePool")
            .field("min", &self.shared.min)
            .field("max", &self.shared.max)
            .field("current", &self.current_workers())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TaskResult;
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_starts_min_workers() {
        let pool = AdaptivePool::new(2, 4, 16, Duration::from_secs(5)).unwrap();
        assert_eq!(pool.current_workers(), 2);
        assert_eq!(pool.min_workers(), 2);
        assert_eq!(pool.max_workers(), 4);
    }

    #[test]
    fn test_rejects_invalid_bounds() {
        assert!(matches!(
            AdaptivePool::new(4, 2, 16, Duration::from_secs(1)),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn test_scales_up_under_load_and_back_down() {
        let pool = AdaptivePool::new(1, 4, 8, Duration::from_millis(50)).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

        for _ in 0..8 {
            let release_rx = release_rx.clone();
            assert!(pool.submit(move |_: &Context| {
                let _ = release_rx.recv();
                Ok(())
            }));
        }
        assert!(pool.current_workers() > 1);
        assert!(pool.current_workers() <= 4);
        assert!(pool.peak_workers() <= 4);

        drop(release_tx);
        assert!(wait_until(Duration::from_secs(5), || pool.stats().completed == 8));
        assert!(wait_until(Duration::from_secs(5), || pool.current_workers() == 1));
    }

    #[test]
    fn test_never_retires_below_min() {
        let pool = AdaptivePool::new(3, 6, 8, Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(pool.current_workers(), 3);
    }

    #[test]
    fn test_full_queue_and_stop() {
        let pool = AdaptivePool::new(1, 1, 2, Duration::from_secs(5)).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        assert!(pool.submit(move |_: &Context| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok(())
        }));
        started_rx.recv().unwrap();

        assert!(pool.submit(|_: &Context| Ok(())));
        assert!(pool.submit(|_: &Context| Ok(())));
        assert!(matches!(
            pool.try_submit(|_: &Context| Ok(())),
            Err(PoolError::QueueFull)
        ));

        release_tx.send(()).unwrap();
        pool.stop();
        assert_eq!(pool.current_workers(), 0);
        assert_eq!(pool.stats().completed, 3);
        assert!(!pool.submit(|_: &Context| Ok(())));
    }

    #[test]
    fn test_panicking_task_keeps_worker() {
        let pool = AdaptivePool::new(1, 1, 4, Duration::from_secs(5)).unwrap();
        assert!(pool.submit(|_: &Context| -> TaskResult { panic!("boom") }));
        let (tx, rx) = crossbeam_channel::bounded(1);
        assert!(pool.submit(move |_: &Context| {
            let _ = tx.send(());
            Ok(())
        }));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pool.current_workers(), 1);
        assert_eq!(pool.stats().panicked, 1);
    }
}

//! Fixed-size worker pool over a [`RingBuffer`].
//!
//! Workers busy-poll the ring: an empty pop yields the thread and retries.
//! That keeps hand-off latency at a scheduler tick instead of a wake-up, which
//! is what an interactive suggestion path wants, at the cost of burning idle
//! CPU while the pool is started. Stop the pool when the burst is over.

use super::task::{panic_message, run_isolated, BoxTask, Outcome, Task};
use super::{Counters, PoolStats};
use crate::config::WorkerPoolConfig;
use crate::context::Context;
use crate::error::PoolError;
use crate::ring::RingBuffer;
use core::any::Any;
use core::fmt;
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

type PanicHandler = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

struct Job {
    task: BoxTask,
    reply: Option<Sender<Outcome>>,
}

struct Shared {
    queue: RingBuffer<Job>,
    state: AtomicU8,
    /// Submitters between their state check and their push.
    pushing: AtomicUsize,
    ctx: Context,
    shutdown: Receiver<()>,
    panic_handler: RwLock<Option<PanicHandler>>,
    counters: Counters,
}

impl Shared {
    #[inline]
    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    fn run(&self, job: Job) {
        let handler = self.panic_handler.read().clone();
        let outcome = run_isolated(job.task, &self.ctx, |payload| match handler {
            Some(handler) => (*handler)(payload),
            None => warn!(panic = %panic_message(payload), "task panicked"),
        });
        self.counters.record(&outcome);
        if let Some(reply) = job.reply {
            // The submitter may have given up waiting.
            let _ = reply.send(outcome);
        }
    }

    fn work(&self, id: usize) {
        debug!(worker = id, "worker started");
        while self.is_running() {
            match self.queue.try_pop() {
                Some(job) => self.run(job),
                None => thread::yield_now(),
            }
        }
        // Finish whatever was accepted before the stop.
        while let Some(job) = self.queue.try_pop() {
            self.run(job);
        }
        debug!(worker = id, "worker exited");
    }
}

/// A pool with a fixed number of workers consuming a lock-free ring buffer.
///
/// # Example
///
/// ```
/// use cmdhint_core::{Context, WorkerPool};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(4, 64);
/// pool.start().unwrap();
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let hits = Arc::clone(&hits);
///     assert!(pool.submit(move |_: &Context| {
///         hits.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }));
/// }
///
/// pool.stop();
/// assert_eq!(hits.load(Ordering::SeqCst), 10);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Mutex<Option<Sender<()>>>,
}

impl WorkerPool {
    /// Creates a stopped pool. `workers` and `queue_size` are clamped to at
    /// least one; the queue is rounded up to a power of two.
    pub fn new(workers: usize, queue_size: usize) -> Self {
        let workers = workers.max(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        Self {
            shared: Arc::new(Shared {
                queue: RingBuffer::new(queue_size),
                state: AtomicU8::new(IDLE),
                pushing: AtomicUsize::new(0),
                ctx: Context::new(),
                shutdown: shutdown_rx,
                panic_handler: RwLock::new(None),
                counters: Counters::default(),
            }),
            workers,
            handles: Mutex::new(Vec::with_capacity(workers)),
            shutdown: Mutex::new(Some(shutdown_tx)),
        }
    }

    /// Creates a stopped pool from a validated configuration.
    pub fn init(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self::new(config.workers, config.queue_size))
    }

    /// Spawns the workers. Calling it on a running pool does nothing.
    ///
    /// # Errors
    ///
    /// [`PoolError::Stopped`] if the pool was stopped, or
    /// [`PoolError::Spawn`] if a thread could not be created (the pool is
    /// stopped in that case).
    pub fn start(&self) -> Result<(), PoolError> {
        match self
            .shared
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(RUNNING) => return Ok(()),
            Err(_) => {
                warn!("start() called on a stopped pool");
                return Err(PoolError::Stopped);
            }
        }

        let mut handles = self.handles.lock();
        for id in 0..self.workers {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("cmdhint-worker-{}", id))
                .spawn(move || shared.work(id));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    drop(handles);
                    self.stop();
                    return Err(PoolError::Spawn(e));
                }
            }
        }
        debug!(
            workers = self.workers,
            capacity = self.shared.queue.capacity(),
            "worker pool started"
        );
        Ok(())
    }

    /// Stops accepting work, lets workers finish queued tasks, and joins them.
    ///
    /// Every task accepted before `stop()` returns is run exactly once. Tasks
    /// see their context cancelled, and callers blocked in
    /// [`submit_wait`](Self::submit_wait) are released with
    /// [`PoolError::Cancelled`]. Safe to call more than once.
    pub fn stop(&self) {
        let previous = self.shared.state.swap(STOPPED, Ordering::SeqCst);
        self.shared.ctx.cancel();
        drop(self.shutdown.lock().take());

        let handles = core::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread panicked outside a task");
            }
        }

        // A submit that saw the pool running may still be pushing; once it
        // lands, its job is run here since the workers are gone.
        while self.shared.pushing.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }
        let mut late = 0usize;
        while let Some(job) = self.shared.queue.try_pop() {
            self.shared.run(job);
            late += 1;
        }
        if previous != STOPPED {
            debug!(late, "worker pool stopped");
        }
    }

    /// Queues `task` without blocking. Returns `false` on back-pressure.
    pub fn submit<T: Task>(&self, task: T) -> bool {
        self.try_submit(task).is_ok()
    }

    /// Queues `task` without blocking.
    ///
    /// # Errors
    ///
    /// [`PoolError::Inactive`] if the pool is not running, or
    /// [`PoolError::QueueFull`] if the ring buffer has no free slot.
    pub fn try_submit<T: Task>(&self, task: T) -> Result<(), PoolError> {
        self.push(Job {
            task: Box::new(task),
            reply: None,
        })
    }

    /// Queues `task` and blocks until it has run or the pool is stopped.
    ///
    /// Fails immediately on back-pressure. If `stop()` is called before the
    /// task reports back, returns [`PoolError::Cancelled`]; the task itself
    /// still runs during the stop.
    pub fn submit_wait<T: Task>(&self, task: T) -> Result<(), PoolError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.push(Job {
            task: Box::new(task),
            reply: Some(tx),
        })?;
        select! {
            recv(rx) -> outcome => match outcome {
                Ok(outcome) => outcome.into_result(),
                Err(_) => Err(PoolError::Cancelled),
            },
            recv(self.shared.shutdown) -> _ => match rx.try_recv() {
                Ok(outcome) => outcome.into_result(),
                Err(_) => Err(PoolError::Cancelled),
            },
        }
    }

    fn push(&self, job: Job) -> Result<(), PoolError> {
        // Pairs with `stop()`: either this sees STOPPED, or `stop()` sees the
        // count and waits for the push before its final drain.
        self.shared.pushing.fetch_add(1, Ordering::SeqCst);
        let pushed = if self.shared.state.load(Ordering::SeqCst) == RUNNING {
            self.shared
                .queue
                .try_push(job)
                .map_err(|_| PoolError::QueueFull)
        } else {
            Err(PoolError::Inactive)
        };
        self.shared.pushing.fetch_sub(1, Ordering::SeqCst);
        pushed
    }

    /// Installs a hook that receives the payload of every task panic.
    ///
    /// Without a handler, panics are logged at `warn` level.
    pub fn set_panic_handler<F>(&self, handler: F)
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        *self.shared.panic_handler.write() = Some(Arc::new(handler));
    }

    /// Returns `true` while the pool accepts work.
    pub fn is_active(&self) -> bool {
        self.shared.is_running()
    }

    /// Snapshot of the pool's size, queue and outcome counters.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            workers: self.workers,
            queue_size: self.shared.queue.len(),
            capacity: self.shared.queue.capacity(),
            active: self.is_active(),
            ..PoolStats::default()
        };
        self.shared.counters.fill(&mut stats);
        stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("queue", &self.shared.queue)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TaskResult;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_rejects_before_start_and_after_stop() {
        let pool = WorkerPool::new(2, 8);
        assert!(!pool.submit(|_: &Context| Ok(())));
        assert!(matches!(
            pool.try_submit(|_: &Context| Ok(())),
            Err(PoolError::Inactive)
        ));

        pool.start().unwrap();
        pool.start().unwrap();
        assert!(pool.is_active());

        pool.stop();
        pool.stop();
        assert!(!pool.submit(|_: &Context| Ok(())));
        assert!(matches!(pool.start(), Err(PoolError::Stopped)));
    }

    #[test]
    fn test_runs_every_accepted_task_once() {
        let pool = WorkerPool::new(4, 128);
        pool.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            assert!(pool.submit(move |_: &Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.stats().completed, 100);
    }

    #[test]
    fn test_full_queue_is_back_pressure() {
        let pool = WorkerPool::new(1, 2);
        pool.start().unwrap();
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
        assert_eq!(pool.stats().queue_size, 2);

        release_tx.send(()).unwrap();
        pool.stop();
        assert_eq!(pool.stats().completed, 3);
    }

    #[test]
    fn test_submit_wait_reports_outcome() {
        let pool = WorkerPool::new(2, 8);
        pool.start().unwrap();

        assert!(pool.submit_wait(|_: &Context| Ok(())).is_ok());
        assert!(matches!(
            pool.submit_wait(|_: &Context| -> TaskResult { Err("no match".into()) }),
            Err(PoolError::Task(_))
        ));
        match pool.submit_wait(|_: &Context| -> TaskResult { panic!("bad regex") }) {
            Err(PoolError::Panicked(msg)) => assert_eq!(msg, "bad regex"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_panic_does_not_shrink_pool() {
        let pool = WorkerPool::new(1, 16);
        let panics = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&panics);
        pool.set_panic_handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        pool.start().unwrap();

        for _ in 0..3 {
            assert!(pool.submit(|_: &Context| -> TaskResult { panic!("boom") }));
        }
        // The single worker must survive to run this.
        assert!(pool.submit_wait(|_: &Context| Ok(())).is_ok());

        let stats = pool.stats();
        assert_eq!(panics.load(Ordering::SeqCst), 3);
        assert_eq!(stats.panicked, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.workers, 1);
    }

    #[test]
    fn test_stop_cancels_task_context() {
        let pool = WorkerPool::new(1, 4);
        pool.start().unwrap();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let observed = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&observed);
        assert!(pool.submit(move |ctx: &Context| {
            let _ = started_tx.send(());
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            flag.store(1, Ordering::SeqCst);
            Ok(())
        }));
        started_rx.recv().unwrap();
        pool.stop();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tiny_queue_runs_and_stops() {
        let pool = WorkerPool::init(WorkerPoolConfig {
            workers: 1,
            queue_size: 1,
        })
        .unwrap();
        assert_eq!(pool.stats().capacity, 2);
        pool.start().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let mut accepted = 0;
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            if pool.submit(move |_: &Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }) {
                accepted += 1;
            }
        }
        pool.stop();
        assert!(accepted >= 2);
        assert_eq!(counter.load(Ordering::SeqCst), accepted);
    }

    #[test]
    fn test_init_validates() {
        let config = WorkerPoolConfig {
            workers: 0,
            queue_size: 8,
        };
        assert!(matches!(
            WorkerPool::init(config),
            Err(PoolError::Config(_))
        ));
    }
}

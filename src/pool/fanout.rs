//! Scatter/gather over a [`WorkerPool`] under a deadline.
//!
//! The suggestion layer queries several sources at once (history, aliases,
//! project scripts) and ranks whatever came back in time. [`fan_out`] submits
//! one job per source and collects results until every job has reported or
//! the caller's [`Context`] is done; late results are dropped.

use super::fixed::WorkerPool;
use crate::context::Context;
use crate::error::BoxError;
use crossbeam_channel::RecvTimeoutError;
use std::time::Duration;

/// Upper bound on one wait, so cancellation without a deadline is noticed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What came back from a [`fan_out`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut<R> {
    /// Results that arrived before the deadline, in arrival order.
    pub results: Vec<R>,
    /// Jobs the pool refused (queue full or pool inactive).
    pub rejected: usize,
    /// Jobs that returned an error or panicked.
    pub failed: usize,
    /// Jobs still outstanding when the context finished.
    pub timed_out: usize,
}

impl<R> FanOut<R> {
    /// Returns `true` if every job reported a result.
    pub fn is_complete(&self) -> bool {
        self.rejected == 0 && self.failed == 0 && self.timed_out == 0
    }
}

/// Runs each job on `pool` and gathers results until `ctx` is done.
///
/// Jobs receive `ctx`, so they can watch the same deadline. A job the pool
/// rejects is counted in [`FanOut::rejected`] and never runs.
///
/// # Example
///
/// ```
/// use cmdhint_core::pool::fan_out;
/// use cmdhint_core::{Context, WorkerPool};
/// use std::time::Duration;
///
/// let pool = WorkerPool::new(4, 16);
/// pool.start().unwrap();
///
/// let sources = ["history", "aliases", "scripts"];
/// let jobs = sources.map(|source| {
///     move |_: &Context| Ok::<_, cmdhint_core::BoxError>(format!("{}: git status", source))
/// });
///
/// let ctx = Context::new().with_timeout(Duration::from_secs(5));
/// let gathered = fan_out(&pool, jobs, &ctx);
/// assert_eq!(gathered.results.len(), 3);
/// assert!(gathered.is_complete());
/// ```
pub fn fan_out<R, I, F>(pool: &WorkerPool, jobs: I, ctx: &Context) -> FanOut<R>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(&Context) -> Result<R, BoxError> + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded::<Option<R>>();
    let mut submitted = 0usize;
    let mut rejected = 0usize;

    for job in jobs {
        let tx = tx.clone();
        let job_ctx = ctx.clone();
        let task = move |_: &Context| match job(&job_ctx) {
            Ok(result) => {
                let _ = tx.send(Some(result));
                Ok(())
            }
            Err(e) => {
                let _ = tx.send(None);
                Err(e)
            }
        };
        if pool.submit(task) {
            submitted += 1;
        } else {
            rejected += 1;
        }
    }
    // Only the submitted tasks hold senders now; a panicking task drops its
    // sender without reporting.
    drop(tx);

    let mut results = Vec::with_capacity(submitted);
    let mut failed = 0usize;
    let mut received = 0usize;
    while received < submitted && !ctx.is_done() {
        let wait = ctx
            .remaining()
            .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
        match rx.recv_timeout(wait) {
            Ok(Some(result)) => {
                results.push(result);
                received += 1;
            }
            Ok(None) => {
                failed += 1;
                received += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                failed += submitted - received;
                received = submitted;
            }
        }
    }

    let timed_out = submitted - received;
    if timed_out > 0 || rejected > 0 {
        tracing::debug!(submitted, rejected, failed, timed_out, "fan-out finished early");
    }
    FanOut {
        results,
        rejected,
        failed,
        timed_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    type Job = Box<dyn FnOnce(&Context) -> Result<u32, BoxError> + Send>;

    fn started(workers: usize, queue: usize) -> WorkerPool {
        let pool = WorkerPool::new(workers, queue);
        pool.start().unwrap();
        pool
    }

    #[test]
    fn test_collects_all_results() {
        let pool = started(4, 16);
        let jobs: Vec<Job> = (0..5u32)
            .map(|i| -> Job {
                Box::new(move |_: &Context| -> Result<u32, BoxError> { Ok(i * 2) })
            })
            .collect();
        let mut out = fan_out(&pool, jobs, &Context::new());
        out.results.sort_unstable();
        assert_eq!(out.results, vec![0, 2, 4, 6, 8]);
        assert!(out.is_complete());
    }

    #[test]
    fn test_failures_and_panics_are_counted() {
        let pool = started(2, 16);
        let jobs: Vec<Job> = vec![
            Box::new(|_: &Context| -> Result<u32, BoxError> { Ok(1) }),
            Box::new(|_: &Context| -> Result<u32, BoxError> { Err("source offline".into()) }),
            Box::new(|_: &Context| -> Result<u32, BoxError> { panic!("parser bug") }),
        ];
        let out = fan_out(&pool, jobs, &Context::new().with_timeout(Duration::from_secs(5)));
        assert_eq!(out.results, vec![1]);
        assert_eq!(out.failed, 2);
        assert_eq!(out.timed_out, 0);
    }

    #[test]
    fn test_deadline_returns_partial_results() {
        let pool = started(2, 16);
        let jobs: Vec<Job> = vec![
            Box::new(|_: &Context| -> Result<u32, BoxError> { Ok(1) }),
            Box::new(|ctx: &Context| -> Result<u32, BoxError> {
                while !ctx.is_done() {
                    thread::sleep(Duration::from_millis(5));
                }
                thread::sleep(Duration::from_millis(50));
                Ok(2)
            }),
        ];
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        let out = fan_out(&pool, jobs, &ctx);
        assert_eq!(out.results, vec![1]);
        assert_eq!(out.timed_out, 1);
    }

    #[test]
    fn test_rejections_are_counted() {
        let pool = WorkerPool::new(1, 4);
        let jobs: Vec<Job> = vec![Box::new(|_: &Context| -> Result<u32, BoxError> { Ok(1) })];
        let out = fan_out(&pool, jobs, &Context::new());
        assert_eq!(out.rejected, 1);
        assert!(out.results.is_empty());
    }
}

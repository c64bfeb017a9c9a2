// Simulation runners: drive each component with synthetic traffic

use crate::generator::{QueryGenerator, QueryMix};
use crate::models::{
    per_second, CacheParams, CacheRow, PoolKind, PoolParams, PoolRow, ResilienceParams,
    ResilienceRow,
};
use cmdhint_core::{
    AdaptivePool, BoxError, CircuitBreaker, Context, PoolError, PoolStats, Priority,
    PriorityPool, RateLimiter, ShardedCache, StatsCache, WorkerPool,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Replays a query stream through a `StatsCache<ShardedCache>` on `threads` threads.
///
/// Every miss is followed by a `set`, the way the suggestion layer fills the
/// cache after a search.
pub fn run_cache(params: &CacheParams, mix: QueryMix, threads: usize) -> CacheRow {
    let cache: Arc<StatsCache<String, Vec<String>>> = Arc::new(StatsCache::new(
        ShardedCache::new(params.capacity, params.shards),
    ));
    let threads = threads.max(1);

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let params = *params;
            thread::spawn(move || {
                let mut generator = QueryGenerator::new(mix, params.seed.wrapping_add(t as u64));
                for _ in 0..params.operations {
                    let query = generator.next_query();
                    if cache.get(query.as_str()).is_none() {
                        let suggestions = vec![format!("{} --help", query)];
                        cache.set(query, suggestions, params.ttl);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            tracing::warn!("cache replay thread panicked");
        }
    }
    let elapsed = start.elapsed();

    let counters = cache.inner().shard_metrics();
    let lookups = cache.hits() + cache.misses();
    debug!(threads, lookups, ?elapsed, "cache replay finished");
    CacheRow {
        threads,
        capacity: cache.inner().capacity(),
        shards: cache.inner().shard_count(),
        lookups,
        hits: cache.hits(),
        misses: cache.misses(),
        hit_rate: cache.hit_rate(),
        evictions: counters.evictions,
        expirations: counters.expirations,
        duration_ms: elapsed.as_millis() as u64,
        ops_per_sec: per_second(lookups, elapsed),
    }
}

/// CPU-light task body: a short hash-like loop.
fn busy_work(iterations: u32) -> u64 {
    let mut acc = 0xcbf2_9ce4_8422_2325u64;
    for i in 0..iterations {
        acc ^= i as u64;
        acc = acc.wrapping_mul(0x0100_0000_01b3);
    }
    black_box(acc)
}

/// Submits `tasks` tasks, retrying on back-pressure up to a bound, and
/// returns how many were never accepted.
fn submit_all<F>(tasks: usize, mut submit: F) -> usize
where
    F: FnMut(usize) -> Result<(), PoolError>,
{
    let mut rejected = 0;
    for i in 0..tasks {
        let mut attempts = 0;
        loop {
            match submit(i) {
                Ok(()) => break,
                Err(PoolError::QueueFull) if attempts < 1_000 => {
                    attempts += 1;
                    thread::yield_now();
                }
                Err(_) => {
                    rejected += 1;
                    break;
                }
            }
        }
    }
    rejected
}

fn pool_row(
    kind: PoolKind,
    submitted: usize,
    rejected: usize,
    stats: PoolStats,
    peak_workers: usize,
    elapsed: Duration,
) -> PoolRow {
    PoolRow {
        pool: kind.as_str().to_string(),
        submitted,
        rejected,
        completed: stats.completed,
        failed: stats.failed,
        panicked: stats.panicked,
        peak_workers,
        duration_ms: elapsed.as_millis() as u64,
        tasks_per_sec: per_second(stats.completed, elapsed),
    }
}

/// Pushes the same batch through one pool and reports throughput.
///
/// Every hundredth task fails, so failure accounting shows up in the report.
pub fn run_pool(kind: PoolKind, params: &PoolParams) -> Result<PoolRow, PoolError> {
    let work = params.work;
    let task = move |i: usize| {
        move |_: &Context| -> Result<(), BoxError> {
            busy_work(work);
            if i % 100 == 99 {
                return Err(format!("task {} failed", i).into());
            }
            Ok(())
        }
    };

    let start = Instant::now();
    let row = match kind {
        PoolKind::Fixed => {
            let pool = WorkerPool::new(params.workers, params.queue_size);
            pool.start()?;
            let rejected = submit_all(params.tasks, |i| pool.try_submit(task(i)));
            pool.stop();
            pool_row(
                kind,
                params.tasks,
                rejected,
                pool.stats(),
                params.workers,
                start.elapsed(),
            )
        }
        PoolKind::Adaptive => {
            let pool = AdaptivePool::new(
                1,
                params.workers.max(1),
                params.queue_size,
                Duration::from_millis(50),
            )?;
            let rejected = submit_all(params.tasks, |i| pool.try_submit(task(i)));
            pool.stop();
            pool_row(
                kind,
                params.tasks,
                rejected,
                pool.stats(),
                pool.peak_workers(),
                start.elapsed(),
            )
        }
        PoolKind::Priority => {
            let pool = PriorityPool::new(params.workers, params.queue_size)?;
            let rejected = submit_all(params.tasks, |i| {
                let priority = Priority::ALL[i % Priority::ALL.len()];
                pool.try_submit(priority, task(i))
            });
            pool.stop();
            pool_row(
                kind,
                params.tasks,
                rejected,
                pool.stats(),
                params.workers,
                start.elapsed(),
            )
        }
    };
    info!(pool = %kind, completed = row.completed, rejected = row.rejected, "pool run finished");
    Ok(row)
}

/// Calls a flaky synthetic source through a rate limiter and a circuit breaker.
pub fn run_resilience(params: &ResilienceParams) -> ResilienceRow {
    let limiter = RateLimiter::new(params.rate, params.interval);
    let breaker = CircuitBreaker::new(params.threshold, params.breaker_timeout);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let failure_rate = params.failure_rate.clamp(0.0, 1.0);

    let mut row = ResilienceRow {
        calls: params.calls,
        ..ResilienceRow::default()
    };
    let start = Instant::now();
    for _ in 0..params.calls {
        if !params.pacing.is_zero() {
            thread::sleep(params.pacing);
        }
        if !limiter.allow() {
            row.throttled += 1;
            continue;
        }
        row.allowed += 1;
        let fails = rng.gen_bool(failure_rate);
        match breaker.execute(|| if fails { Err("source timed out") } else { Ok(()) }) {
            Ok(()) => row.succeeded += 1,
            Err(e) if e.is_open() => row.open += 1,
            Err(_) => row.failed += 1,
        }
    }
    row.final_state = breaker.state().to_string();
    row.duration_ms = start.elapsed().as_millis() as u64;
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_run_counts_every_lookup() {
        let params = CacheParams {
            capacity: 256,
            shards: 4,
            ttl: Duration::ZERO,
            operations: 2_000,
            seed: 9,
        };
        let row = run_cache(&params, QueryMix::default(), 2);
        assert_eq!(row.lookups, 4_000);
        assert_eq!(row.hits + row.misses, 4_000);
        assert!(row.hits > 0);
    }

    #[test]
    fn test_pool_runs_complete_every_task() {
        let params = PoolParams {
            tasks: 500,
            workers: 2,
            queue_size: 64,
            work: 10,
        };
        for kind in PoolKind::all() {
            let row = run_pool(kind, &params).unwrap();
            let accounted = row.completed + row.failed + row.panicked;
            assert_eq!(accounted as usize + row.rejected, 500, "{}", kind);
            assert_eq!(row.panicked, 0);
        }
    }

    #[test]
    fn test_resilience_run_accounts_for_every_call() {
        let params = ResilienceParams {
            calls: 200,
            rate: 50,
            interval: Duration::from_secs(60),
            failure_rate: 1.0,
            threshold: 3,
            breaker_timeout: Duration::from_secs(60),
            pacing: Duration::ZERO,
            seed: 5,
        };
        let row = run_resilience(&params);
        assert_eq!(row.allowed, 50);
        assert_eq!(row.throttled, 150);
        assert_eq!(row.failed, 3);
        assert_eq!(row.open, 47);
        assert_eq!(row.final_state, "open");
    }
}

//! End-to-end sketch of how a suggestion layer uses the core.
//!
//! A query is answered from the cache when possible. On a miss it is fanned
//! out to three sources on a worker pool under a deadline; the remote source
//! sits behind a rate limiter and a circuit breaker. Index refreshes run on a
//! priority pool and history parsing on an adaptive pool.
//!
//! Run with `RUST_LOG=cmdhint_core=debug cargo run --example suggest_pipeline`.

use cmdhint_core::pool::fan_out;
use cmdhint_core::{
    AdaptivePool, BoxError, CacheMetrics, CircuitBreaker, Context, LoadingCache, Priority,
    PriorityPool, RateLimiter, ShardedCache, StatsCache, WorkerPool,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type Source = Box<dyn FnOnce(&Context) -> Result<Vec<String>, BoxError> + Send>;

/// A remote source that fails every third call.
struct RemoteIndex {
    calls: AtomicU64,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
}

impl RemoteIndex {
    fn query(&self, prefix: &str, ctx: &Context) -> Result<Vec<String>, BoxError> {
        self.limiter.wait(ctx)?;
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let prefix = prefix.to_string();
        self.breaker
            .execute(|| {
                thread::sleep(Duration::from_millis(5));
                if call % 3 == 2 {
                    Err("remote index timed out")
                } else {
                    Ok(vec![format!("{} --help", prefix)])
                }
            })
            .map_err(|e| -> BoxError { e.to_string().into() })
    }
}

fn sources(prefix: &str, remote: &Arc<RemoteIndex>) -> Vec<Source> {
    let history = {
        let prefix = prefix.to_string();
        Box::new(move |_: &Context| -> Result<Vec<String>, BoxError> {
            Ok(vec![format!("{} status", prefix), format!("{} log", prefix)])
        }) as Source
    };
    let aliases = {
        let prefix = prefix.to_string();
        Box::new(move |_: &Context| -> Result<Vec<String>, BoxError> {
            Ok(vec![format!("{}s", prefix)])
        }) as Source
    };
    let remote_source = {
        let prefix = prefix.to_string();
        let remote = Arc::clone(remote);
        Box::new(move |ctx: &Context| remote.query(&prefix, ctx)) as Source
    };
    vec![history, aliases, remote_source]
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cache: StatsCache<String, Vec<String>> = StatsCache::new(ShardedCache::new(1024, 8));
    let search = WorkerPool::new(4, 64);
    search.start()?;

    let remote = Arc::new(RemoteIndex {
        calls: AtomicU64::new(0),
        limiter: RateLimiter::new(5, Duration::from_millis(100)),
        breaker: CircuitBreaker::new(2, Duration::from_millis(200)),
    });

    for query in ["git", "cargo", "git", "docker", "cargo", "git"] {
        if let Some(hits) = cache.get(query) {
            println!("{:<8} cached   {:?}", query, hits);
            continue;
        }
        let ctx = Context::new().with_timeout(Duration::from_millis(250));
        let gathered = fan_out(&search, sources(query, &remote), &ctx);
        let mut hits: Vec<String> = gathered.results.into_iter().flatten().collect();
        hits.sort();
        println!(
            "{:<8} searched {:?} (failed {}, timed out {})",
            query, hits, gathered.failed, gathered.timed_out
        );
        cache.set(query.to_string(), hits, Duration::from_secs(30));
    }
    println!(
        "cache hit rate {:.0}%, breaker {}",
        cache.hit_rate() * 100.0,
        remote.breaker.state()
    );

    // Man-page lookups are expensive and shared by concurrent callers.
    let man_pages: LoadingCache<String, usize> =
        LoadingCache::new(ShardedCache::new(256, 4), Duration::from_secs(60));
    let pages = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    man_pages.get_or_compute("tar".to_string(), |name| {
                        thread::sleep(Duration::from_millis(20));
                        name.len() * 100
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect::<Vec<_>>()
    });
    println!("man page sizes {:?}, loads {}", pages, man_pages.loads());

    // Index maintenance: user-visible refreshes go first.
    let maintenance = PriorityPool::new(1, 16)?;
    for (priority, job) in [
        (Priority::Low, "compact history"),
        (Priority::High, "refresh project scripts"),
        (Priority::Medium, "rebuild alias index"),
    ] {
        maintenance.submit(priority, move |_: &Context| {
            println!("maintenance [{}] {}", priority, job);
            Ok(())
        });
    }
    maintenance.stop();

    // History parsing bursts through an elastic pool.
    let parser = AdaptivePool::new(1, 4, 32, Duration::from_millis(100))?;
    for _ in 0..24 {
        parser.submit(|_: &Context| {
            thread::sleep(Duration::from_millis(2));
            Ok(())
        });
    }
    parser.stop();
    println!(
        "parser peak workers {}, completed {}",
        parser.peak_workers(),
        parser.stats().completed
    );

    search.stop();
    for (name, value) in cache.metrics() {
        println!("cache.{} = {}", name, value);
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use cmdhint_sim::generator::QueryMix;
use cmdhint_sim::models::{CacheParams, PoolKind, PoolParams, ResilienceParams};
use cmdhint_sim::{runner, stats};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// cmdhint concurrency-core simulator CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Export results to CSV file
    #[arg(long, value_name = "PATH", global = true)]
    output_csv: Option<PathBuf>,
}

/// Subcommands for the CLI
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a synthetic query stream through the sharded cache
    Cache {
        /// Cache capacity (number of entries)
        #[arg(short, long, default_value = "4096")]
        capacity: usize,

        /// Number of shards (rounded up to a power of two)
        #[arg(long, default_value = "16")]
        shards: usize,

        /// Entry TTL in milliseconds (0 = never expire)
        #[arg(long, default_value = "0")]
        ttl_ms: u64,

        /// Thread counts to compare
        #[arg(short, long, value_delimiter = ',', default_value = "1,4,8")]
        threads: Vec<usize>,

        /// Lookups per thread
        #[arg(long, default_value = "100000")]
        operations: usize,

        /// Number of distinct queries
        #[arg(long, default_value = "10000")]
        queries: u32,

        /// Percentage of traffic from popular queries (default: 80%)
        #[arg(long, default_value = "80")]
        popular_traffic: u8,

        /// Percentage of queries that are popular (default: 20%)
        #[arg(long, default_value = "20")]
        popular_queries: u8,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Push a batch of CPU-light tasks through each pool
    Pools {
        /// Tasks per pool
        #[arg(long, default_value = "50000")]
        tasks: usize,

        /// Worker threads (max workers for the adaptive pool)
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Queue capacity (per priority level for the priority pool)
        #[arg(long, default_value = "1024")]
        queue_size: usize,

        /// Busy-loop iterations per task
        #[arg(long, default_value = "1000")]
        work: u32,
    },

    /// Call a flaky source through a rate limiter and circuit breaker
    Resilience {
        /// Calls to attempt
        #[arg(long, default_value = "2000")]
        calls: usize,

        /// Tokens per interval
        #[arg(long, default_value = "100")]
        rate: u64,

        /// Rate limiter interval in milliseconds
        #[arg(long, default_value = "100")]
        interval_ms: u64,

        /// Probability that a call fails (0.0-1.0)
        #[arg(long, default_value = "0.3")]
        failure_rate: f64,

        /// Consecutive failures that open the breaker
        #[arg(long, default_value = "5")]
        threshold: u32,

        /// Breaker open timeout in milliseconds
        #[arg(long, default_value = "200")]
        breaker_timeout_ms: u64,

        /// Pause between calls in microseconds
        #[arg(long, default_value = "500")]
        pacing_us: u64,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Cache {
            capacity,
            shards,
            ttl_ms,
            threads,
            operations,
            queries,
            popular_traffic,
            popular_queries,
            seed,
        } => {
            let params = CacheParams {
                capacity,
                shards,
                ttl: Duration::from_millis(ttl_ms),
                operations,
                seed,
            };
            let mix = QueryMix {
                unique_queries: queries,
                popular_traffic,
                popular_queries,
            };
            println!(
                "Replaying {} lookups per thread over {} queries ({}% of traffic to {}% of queries)",
                operations, queries, popular_traffic, popular_queries
            );
            let rows: Vec<_> = threads
                .iter()
                .map(|&t| runner::run_cache(&params, mix, t))
                .collect();
            stats::print_cache_summary(&rows);
            if let Some(path) = args.output_csv {
                stats::export_csv(&rows, &path)?;
            }
        }
        Commands::Pools {
            tasks,
            workers,
            queue_size,
            work,
        } => {
            let params = PoolParams {
                tasks,
                workers,
                queue_size,
                work,
            };
            println!(
                "Running {} tasks through each pool ({} workers, queue {})",
                tasks, workers, queue_size
            );
            let mut rows = Vec::new();
            for kind in PoolKind::all() {
                rows.push(runner::run_pool(kind, &params)?);
            }
            stats::print_pool_summary(&rows);
            if let Some(path) = args.output_csv {
                stats::export_csv(&rows, &path)?;
            }
        }
        Commands::Resilience {
            calls,
            rate,
            interval_ms,
            failure_rate,
            threshold,
            breaker_timeout_ms,
            pacing_us,
            seed,
        } => {
            let params = ResilienceParams {
                calls,
                rate,
                interval: Duration::from_millis(interval_ms),
                failure_rate,
                threshold,
                breaker_timeout: Duration::from_millis(breaker_timeout_ms),
                pacing: Duration::from_micros(pacing_us),
                seed,
            };
            let row = runner::run_resilience(&params);
            stats::print_resilience_summary(&row);
            if let Some(path) = args.output_csv {
                stats::export_csv(std::slice::from_ref(&row), &path)?;
            }
        }
    }

    Ok(())
}

// Data models for the simulator

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Parameters for a cache replay
#[derive(Debug, Clone, Copy)]
pub struct CacheParams {
    /// Total cache capacity
    pub capacity: usize,
    /// Requested shard count
    pub shards: usize,
    /// TTL for every stored entry (zero never expires)
    pub ttl: Duration,
    /// Lookups per thread
    pub operations: usize,
    /// RNG seed; each thread offsets it by its index
    pub seed: u64,
}

/// Which pool a run exercised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKind {
    Fixed,
    Adaptive,
    Priority,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Fixed => "fixed",
            PoolKind::Adaptive => "adaptive",
            PoolKind::Priority => "priority",
        }
    }

    /// All pool kinds, in report order
    pub fn all() -> Vec<PoolKind> {
        vec![PoolKind::Fixed, PoolKind::Adaptive, PoolKind::Priority]
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a pool run
#[derive(Debug, Clone, Copy)]
pub struct PoolParams {
    /// Tasks submitted per pool
    pub tasks: usize,
    /// Workers for the fixed and priority pools, and max for the adaptive pool
    pub workers: usize,
    /// Queue capacity (per level for the priority pool)
    pub queue_size: usize,
    /// Busy-work iterations per task
    pub work: u32,
}

/// Parameters for a resilience run
#[derive(Debug, Clone, Copy)]
pub struct ResilienceParams {
    /// Calls attempted
    pub calls: usize,
    /// Tokens per interval
    pub rate: u64,
    /// Rate limiter interval
    pub interval: Duration,
    /// Probability that the synthetic source fails a call
    pub failure_rate: f64,
    /// Consecutive failures that open the breaker
    pub threshold: u32,
    /// How long the breaker stays open
    pub breaker_timeout: Duration,
    /// Pause between calls
    pub pacing: Duration,
    /// RNG seed
    pub seed: u64,
}

/// One row of cache results (one per thread count)
#[derive(Debug, Clone, Serialize)]
pub struct CacheRow {
    pub threads: usize,
    pub capacity: usize,
    pub shards: usize,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub duration_ms: u64,
    pub ops_per_sec: f64,
}

/// One row of pool results (one per pool kind)
#[derive(Debug, Clone, Serialize)]
pub struct PoolRow {
    pub pool: String,
    pub submitted: usize,
    pub rejected: usize,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub peak_workers: usize,
    pub duration_ms: u64,
    pub tasks_per_sec: f64,
}

/// Result of a resilience run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResilienceRow {
    pub calls: usize,
    pub allowed: usize,
    pub throttled: usize,
    pub open: usize,
    pub failed: usize,
    pub succeeded: usize,
    pub final_state: String,
    pub duration_ms: u64,
}

/// Throughput helper shared by the runners
pub fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

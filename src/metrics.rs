//! Cache Metrics System
//!
//! Every cache in this crate reports its counters through the [`CacheMetrics`]
//! trait as a `BTreeMap<String, f64>`, so the simulator and the application's
//! diagnostics command can print them without knowing the concrete type.
//!
//! # Why BTreeMap over HashMap?
//!
//! - **Deterministic ordering**: metrics always print in the same order
//! - **Reproducible output**: simulator CSV exports diff cleanly between runs
//!
//! There are two kinds of counters:
//!
//! - [`ShardMetrics`]: plain integers owned by a cache shard and updated while
//!   the shard's write lock is held (insertions, updates, evictions,
//!   expirations, removals).
//! - [`HitCounters`]: relaxed atomics used by [`StatsCache`](crate::StatsCache)
//!   to count hits and misses without taking any lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracked by each cache shard.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShardMetrics {
    /// New keys written into the shard
    pub insertions: u64,

    /// Existing keys overwritten by `set`
    pub updates: u64,

    /// Live entries dropped to make room for a new key
    pub evictions: u64,

    /// Entries dropped because their TTL passed
    pub expirations: u64,

    /// Entries dropped by an explicit `delete`
    pub removals: u64,
}

impl ShardMetrics {
    /// Adds another shard's counters into this one.
    pub fn merge(&mut self, other: &ShardMetrics) {
        self.insertions += other.insertions;
        self.updates += other.updates;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
        self.removals += other.removals;
    }

    /// Convert the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("expirations".to_string(), self.expirations as f64);
        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert("removals".to_string(), self.removals as f64);
        metrics.insert("updates".to_string(), self.updates as f64);
        metrics
    }
}

/// Lock-free hit/miss counters.
#[derive(Debug, Default)]
pub struct HitCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounters {
    /// Records a cache hit.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cache miss.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of hits recorded so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of misses recorded so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hits divided by lookups, or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Zeroes both counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Convert the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let hits = self.hits();
        let misses = self.misses();
        let mut metrics = BTreeMap::new();
        metrics.insert("cache_hits".to_string(), hits as f64);
        metrics.insert("cache_misses".to_string(), misses as f64);
        metrics.insert("requests".to_string(), (hits + misses) as f64);
        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics
    }
}

/// Trait that every cache implements for metrics reporting.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Name used to label this cache in reports.
    fn algorithm_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_metrics_merge() {
        let mut a = ShardMetrics {
            insertions: 3,
            evictions: 1,
            ..Default::default()
        };
        let b = ShardMetrics {
            insertions: 2,
            expirations: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.insertions, 5);
        assert_eq!(a.evictions, 1);
        assert_eq!(a.expirations, 4);

        let map = a.to_btreemap();
        assert_eq!(map.get("insertions"), Some(&5.0));
        let keys: Vec<_> = map.keys().cloned().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_hit_counters() {
        let counters = HitCounters::default();
        assert_eq!(counters.hit_rate(), 0.0);
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.hits(), 3);
        assert_eq!(counters.misses(), 1);
        assert!((counters.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(counters.to_btreemap().get("requests"), Some(&4.0));
        counters.reset();
        assert_eq!(counters.hits(), 0);
    }
}

//! Hit/miss accounting wrapper around [`ShardedCache`].

use super::{DefaultHashBuilder, ShardedCache};
use crate::metrics::{CacheMetrics, HitCounters};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::BTreeMap;
use std::time::Duration;

/// A [`ShardedCache`] that counts hits and misses.
///
/// Counting uses relaxed atomics outside the shard locks, so it adds no
/// contention and never changes what the cache returns.
///
/// ```
/// use cmdhint_core::{ShardedCache, StatsCache};
/// use std::time::Duration;
///
/// let cache = StatsCache::new(ShardedCache::new(128, 2));
/// cache.set("pwd", "print working directory", Duration::ZERO);
///
/// assert!(cache.get("pwd").is_some());
/// assert!(cache.get("cwd").is_none());
/// assert_eq!(cache.hit_rate(), 0.5);
/// ```
pub struct StatsCache<K, V, S = DefaultHashBuilder> {
    cache: ShardedCache<K, V, S>,
    counters: HitCounters,
}

impl<K, V, S> StatsCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// Wraps `cache` with zeroed counters.
    pub fn new(cache: ShardedCache<K, V, S>) -> Self {
        Self {
            cache,
            counters: HitCounters::default(),
        }
    }

    /// Looks up `key` and records a hit or a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        let value = self.cache.get(key);
        self.record(value.is_some());
        value
    }

    /// Like [`ShardedCache::get_with`], recording a hit or a miss.
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        let value = self.cache.get_with(key, f);
        self.record(value.is_some());
        value
    }

    #[inline]
    fn record(&self, hit: bool) {
        if hit {
            self.counters.record_hit();
        } else {
            self.counters.record_miss();
        }
    }

    /// See [`ShardedCache::set`].
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Option<(K, V)> {
        self.cache.set(key, value, ttl)
    }

    /// See [`ShardedCache::delete`].
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.cache.delete(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Empties the cache. Counters are left alone; see [`reset_stats`](Self::reset_stats).
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Hits recorded since construction or the last reset.
    pub fn hits(&self) -> u64 {
        self.counters.hits()
    }

    /// Misses recorded since construction or the last reset.
    pub fn misses(&self) -> u64 {
        self.counters.misses()
    }

    /// Hits over lookups, 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        self.counters.hit_rate()
    }

    /// Zeroes the hit and miss counters.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &ShardedCache<K, V, S> {
        &self.cache
    }
}

impl<K, V, S> CacheMetrics for StatsCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.cache.metrics();
        metrics.extend(self.counters.to_btreemap());
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "ShardedLRU"
    }
}

impl<K, V, S> core::fmt::Debug for StatsCache<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StatsCache")
            .field("cache", &self.cache)
            .field("counters", &self.counters)
            .finish()
    }
}

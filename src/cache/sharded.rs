//! Sharded LRU cache with per-entry TTL.
//!
//! # Example
//!
//! ```
//! use cmdhint_core::ShardedCache;
//! use std::time::Duration;
//!
//! let cache: ShardedCache<String, Vec<String>> = ShardedCache::new(1024, 8);
//!
//! cache.set(
//!     "undo commit".to_string(),
//!     vec!["git reset --soft HEAD~1".to_string()],
//!     Duration::from_secs(300),
//! );
//!
//! let hit = cache.get("undo commit");
//! assert_eq!(hit.as_deref(), Some(&["git reset --soft HEAD~1".to_string()][..]));
//! assert!(cache.get("list files").is_none());
//! ```

use super::shard::{CacheShard, Probe};
use super::DefaultHashBuilder;
use crate::config::ShardedCacheConfig;
use crate::error::ConfigError;
use crate::metrics::{CacheMetrics, ShardMetrics};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroUsize;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// A thread-safe LRU cache split into independently locked shards.
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Hash + Eq + Clone`.
/// - `V`: Value type. Must implement `Clone` for [`get`](Self::get).
/// - `S`: Hash builder, shared by shard routing and every shard's map.
///
/// # Note on LRU Semantics
///
/// LRU ordering is maintained **per shard**, not globally. An entry in shard A
/// may be evicted while shard B holds entries that were used less recently in
/// wall-clock time.
pub struct ShardedCache<K, V, S = DefaultHashBuilder> {
    shards: Box<[RwLock<CacheShard<K, V, S>>]>,
    hash_builder: S,
    mask: usize,
}

impl<K, V> ShardedCache<K, V, DefaultHashBuilder>
where
    K: Hash + Eq + Clone,
{
    /// Creates a cache holding roughly `capacity` entries across `shards` shards.
    ///
    /// `shards` is clamped to `1..=65536` and rounded up to a power of two, and
    /// `capacity` is clamped to at least one. See
    /// [`ShardedCacheConfig`] for how capacity is split.
    pub fn new(capacity: usize, shards: usize) -> Self {
        Self::init(ShardedCacheConfig {
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            shards: shards.max(1),
        })
    }

    /// Creates a cache from a configuration.
    pub fn init(config: ShardedCacheConfig) -> Self {
        Self::init_with_hasher(config, DefaultHashBuilder::default())
    }

    /// Creates a cache from a configuration, rejecting invalid values.
    pub fn try_init(config: ShardedCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::init(config))
    }
}

impl<K, V, S> ShardedCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// Creates a cache with a custom hash builder.
    ///
    /// Use this for deterministic hashing in tests or simulations.
    pub fn init_with_hasher(config: ShardedCacheConfig, hash_builder: S) -> Self {
        let shard_count = config.shard_count();
        let shard_cap = config.per_shard_capacity();
        let shards: Vec<_> = (0..shard_count)
            .map(|_| RwLock::new(CacheShard::with_hasher(shard_cap, hash_builder.clone())))
            .collect();

        tracing::debug!(
            shards = shard_count,
            shard_capacity = shard_cap.get(),
            "created sharded cache"
        );

        Self {
            shards: shards.into_boxed_slice(),
            hash_builder,
            mask: shard_count - 1,
        }
    }

    /// Returns the shard for `key`.
    ///
    /// Routing uses the high half of the hash; the shard's own table indexes
    /// buckets with the low bits, and reusing them would cluster every key of
    /// a shard into the same few buckets.
    #[inline]
    fn shard<Q>(&self, key: &Q) -> &RwLock<CacheShard<K, V, S>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        let hash = self.hash_builder.hash_one(key);
        &self.shards[((hash >> 32) as usize) & self.mask]
    }

    /// Looks up `key`, returning a clone of the value on a hit.
    ///
    /// A hit moves the entry to the front of its shard's recency list; an
    /// expired entry is removed and reported as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Looks up `key` and applies `f` to the value while the lock is held.
    ///
    /// Same recency and expiry behaviour as [`get`](Self::get), without the clone.
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        let lock = self.shard(key);
        let probe = lock.read().probe(key, Instant::now());
        match probe {
            Probe::Absent => None,
            Probe::Expired => {
                // Another thread may have removed or replaced it in between.
                let mut shard = lock.write();
                let now = Instant::now();
                if shard.remove_if_expired(key, now) {
                    None
                } else {
                    shard.get(key, now).map(f)
                }
            }
            Probe::Live => lock.write().get(key, Instant::now()).map(f),
        }
    }

    /// Returns a clone of a live value without changing its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.shard(key).read().peek(key, Instant::now()).cloned()
    }

    /// Returns `true` if `key` is present and not expired. Does not touch recency.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shard(key).read().probe(key, Instant::now()) == Probe::Live
    }

    /// Inserts or replaces `key`. A zero `ttl` means the entry never expires.
    ///
    /// If the shard is full, already-expired entries at the LRU end are
    /// dropped first; if that frees nothing, the least recently used entry is
    /// evicted.
    ///
    /// # Returns
    ///
    /// - `Some((key, old_value))` if the key existed
    /// - `Some((evicted_key, evicted_value))` if a live entry was evicted
    /// - `None` otherwise
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Option<(K, V)> {
        let lock = self.shard(&key);
        let mut shard = lock.write();
        shard.set(key, value, ttl, Instant::now())
    }

    /// Removes `key`, returning its value if it was present.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shard(key).write().remove(key)
    }

    /// Number of live (unexpired) entries across all shards.
    ///
    /// Takes each shard's read lock in turn, so under concurrent writes the
    /// result is a point-in-time estimate.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shards.iter().map(|s| s.read().live_len(now)).sum()
    }

    /// Returns `true` if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every shard, one lock at a time.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.shards.iter().map(|s| s.write().purge_expired(now)).sum()
    }

    /// Number of hits served by `key`'s entry, if present.
    pub fn access_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shard(key).read().access_count(key)
    }

    /// Maximum number of entries the cache can hold.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|s| s.read().cap().get()).sum()
    }

    /// Number of shards (always a power of two).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Aggregated per-shard counters.
    pub fn shard_metrics(&self) -> ShardMetrics {
        let mut total = ShardMetrics::default();
        for shard in self.shards.iter() {
            total.merge(shard.read().metrics());
        }
        total
    }
}

impl<K, V, S> CacheMetrics for ShardedCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.shard_metrics().to_btreemap();
        metrics.insert("capacity".to_string(), self.capacity() as f64);
        metrics.insert("entries".to_string(), self.len() as f64);
        let stored: usize = self.shards.iter().map(|s| s.read().len()).sum();
        metrics.insert("stored_entries".to_string(), stored as f64);
        metrics.insert("shards".to_string(), self.shard_count() as f64);
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "ShardedLRU"
    }
}

impl<K, V, S> core::fmt::Debug for ShardedCache<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shard_count", &self.shards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn cache(capacity: usize, shards: usize) -> ShardedCache<String, i32> {
        ShardedCache::new(capacity, shards)
    }

    #[test]
    fn test_basic_operations() {
        let cache = cache(100, 4);
        assert!(cache.is_empty());

        cache.set("a".to_string(), 1, Duration::ZERO);
        cache.set("b".to_string(), 2, Duration::ZERO);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), None);
    }

    #[test]
    fn test_two_entry_single_shard_scenario() {
        let cache = cache(2, 1);
        cache.set("a".to_string(), 1, Duration::ZERO);
        cache.set("b".to_string(), 2, Duration::ZERO);
        cache.set("c".to_string(), 3, Duration::ZERO);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.shard_metrics().evictions, 1);
    }

    #[test]
    fn test_shard_count_and_capacity() {
        let cache = cache(100, 3);
        assert_eq!(cache.shard_count(), 4);
        assert_eq!(cache.capacity(), 100);

        let floored = cache_with(100, 16);
        assert_eq!(floored.capacity(), 16 * 16);
    }

    fn cache_with(capacity: usize, shards: usize) -> ShardedCache<u64, u64> {
        ShardedCache::new(capacity, shards)
    }

    #[test]
    fn test_oversized_shard_count_is_clamped() {
        let cache = cache_with(64, usize::MAX);
        assert_eq!(cache.shard_count(), crate::config::cache::MAX_SHARDS);
        cache.set(7, 70, Duration::ZERO);
        assert_eq!(cache.get(&7), Some(70));
    }

    #[test]
    fn test_zero_arguments_are_clamped() {
        let cache = cache_with(0, 0);
        assert_eq!(cache.shard_count(), 1);
        assert_eq!(cache.capacity(), 1);
        cache.set(1, 1, Duration::ZERO);
        cache.set(2, 2, Duration::ZERO);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some(2));
    }

    #[test]
    fn test_expiry_reports_miss() {
        let cache = cache(100, 4);
        cache.set("short".to_string(), 1, Duration::from_millis(10));
        cache.set("long".to_string(), 2, Duration::ZERO);
        assert_eq!(cache.get("short"), Some(1));

        thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains_key("short"));
        assert_eq!(cache.peek("short"), None);
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.shard_metrics().expirations, 1);
    }

    #[test]
    fn test_peek_does_not_change_recency() {
        let cache = cache(2, 1);
        cache.set("a".to_string(), 1, Duration::ZERO);
        cache.set("b".to_string(), 2, Duration::ZERO);
        assert_eq!(cache.peek("a"), Some(1));
        cache.set("c".to_string(), 3, Duration::ZERO);
        assert_eq!(cache.peek("a"), None);
        assert_eq!(cache.access_count("b"), Some(0));
    }

    #[test]
    fn test_get_with_avoids_clone() {
        let cache: ShardedCache<String, String> = ShardedCache::new(16, 1);
        cache.set("k".to_string(), "hello world".to_string(), Duration::ZERO);
        assert_eq!(cache.get_with("k", |v| v.len()), Some(11));
        assert_eq!(cache.get_with("missing", |v| v.len()), None);
        assert_eq!(cache.access_count("k"), Some(1));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = cache(100, 4);
        cache.set("a".to_string(), 1, Duration::ZERO);
        cache.set("b".to_string(), 2, Duration::ZERO);

        assert_eq!(cache.delete("a"), Some(1));
        assert_eq!(cache.delete("a"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        cache.set("c".to_string(), 3, Duration::ZERO);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_purge_expired() {
        let cache = cache_with(256, 4);
        for i in 0..20 {
            let ttl = if i % 2 == 0 {
                Duration::from_millis(5)
            } else {
                Duration::ZERO
            };
            cache.set(i, i, ttl);
        }
        thread::sleep(Duration::from_millis(15));
        assert_eq!(cache.purge_expired(), 10);
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_metrics() {
        let cache = cache(100, 4);
        cache.set("a".to_string(), 1, Duration::ZERO);
        cache.set("a".to_string(), 2, Duration::ZERO);
        let metrics = cache.metrics();
        assert_eq!(metrics.get("insertions"), Some(&1.0));
        assert_eq!(metrics.get("updates"), Some(&1.0));
        assert_eq!(metrics.get("entries"), Some(&1.0));
        assert_eq!(cache.algorithm_name(), "ShardedLRU");
    }

    #[test]
    fn test_init_with_hasher_is_deterministic_per_instance() {
        let hasher = DefaultHashBuilder::default();
        let config = ShardedCacheConfig {
            capacity: NonZeroUsize::new(256).unwrap(),
            shards: 4,
        };
        let cache: ShardedCache<u64, u64, _> = ShardedCache::init_with_hasher(config, hasher);
        for i in 0..32 {
            cache.set(i, i * 10, Duration::ZERO);
        }
        for i in 0..32 {
            assert_eq!(cache.get(&i), Some(i * 10));
        }
    }

    #[test]
    fn test_try_init_rejects_zero_shards() {
        let config = ShardedCacheConfig {
            capacity: NonZeroUsize::new(64).unwrap(),
            shards: 0,
        };
        assert!(ShardedCache::<u64, u64>::try_init(config).is_err());
    }

    #[test]
    fn test_concurrent_access() {
        let cache: Arc<ShardedCache<String, usize>> = Arc::new(ShardedCache::new(1000, 16));
        let mut handles = Vec::new();

        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("thread_{}_key_{}", t, i);
                    cache.set(key.clone(), t * 1000 + i, Duration::ZERO);
                    let _ = cache.get(&key);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!cache.is_empty());
        assert!(cache.len() <= cache.capacity());
    }
}

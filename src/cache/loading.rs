//! Compute-on-miss wrapper around [`ShardedCache`].

use super::{DefaultHashBuilder, HashMap, ShardedCache};
use crate::metrics::CacheMetrics;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Gate = Arc<Mutex<()>>;

/// A cache that fills itself on a miss.
///
/// Concurrent misses for the same key are serialized behind a per-key gate and
/// the cache is checked again once the gate is held, so a burst of lookups for
/// a cold key runs the loader once. Misses for different keys never wait on
/// each other.
///
/// # Example
///
/// ```
/// use cmdhint_core::{LoadingCache, ShardedCache};
/// use std::time::Duration;
///
/// let cache = LoadingCache::new(ShardedCache::new(256, 4), Duration::from_secs(60));
///
/// let first = cache.get_or_compute("find large files".to_string(), |q| {
///     vec![format!("find . -size +100M  # {}", q)]
/// });
/// let second = cache.get_or_compute("find large files".to_string(), |_| unreachable!());
///
/// assert_eq!(first, second);
/// assert_eq!(cache.loads(), 1);
/// ```
pub struct LoadingCache<K, V, S = DefaultHashBuilder> {
    cache: ShardedCache<K, V, S>,
    ttl: Duration,
    in_flight: Mutex<HashMap<K, Gate, DefaultHashBuilder>>,
    loads: AtomicU64,
}

/// Drops the in-flight gate for a key once nobody else is waiting on it.
///
/// Runs on unwind too, so a panicking loader does not strand the entry.
struct Release<'a, K: Hash + Eq, V, S> {
    owner: &'a LoadingCache<K, V, S>,
    key: &'a K,
    gate: Gate,
}

impl<K: Hash + Eq, V, S> Drop for Release<'_, K, V, S> {
    fn drop(&mut self) {
        let mut in_flight = self.owner.in_flight.lock();
        // One reference in the map, one held here.
        if Arc::strong_count(&self.gate) == 2 {
            in_flight.remove(self.key);
        }
    }
}

impl<K, V, S> LoadingCache<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Wraps `cache`; computed values are stored with `ttl` (zero never expires).
    pub fn new(cache: ShardedCache<K, V, S>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            in_flight: Mutex::new(HashMap::default()),
            loads: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.try_get_or_compute(key, |k| Ok::<V, core::convert::Infallible>(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_compute`](Self::get_or_compute), for loaders that can fail.
    ///
    /// Errors are returned to the caller that ran the loader and are not
    /// cached; the next waiter for the same key tries again.
    pub fn try_get_or_compute<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let release = Release {
            gate: self.gate_for(&key),
            owner: self,
            key: &key,
        };
        let _held = release.gate.lock();

        // Whoever held the gate before us may have filled it.
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let value = compute(&key)?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.cache.set(key.clone(), value.clone(), self.ttl);
        Ok(value)
    }

    fn gate_for(&self, key: &K) -> Gate {
        let mut in_flight = self.in_flight.lock();
        if let Some(gate) = in_flight.get(key) {
            return Arc::clone(gate);
        }
        let gate = Gate::default();
        in_flight.insert(key.clone(), Arc::clone(&gate));
        gate
    }

    /// Plain lookup; never runs a loader.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.cache.get(key)
    }

    /// Drops a cached value so the next lookup recomputes it.
    pub fn invalidate<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.cache.delete(key)
    }

    /// Number of times a loader ran successfully.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// TTL applied to computed values.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &ShardedCache<K, V, S> {
        &self.cache
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<K, V, S> CacheMetrics for LoadingCache<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.cache.metrics();
        metrics.insert("loads".to_string(), self.loads() as f64);
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "LoadingShardedLRU"
    }
}

impl<K, V, S> core::fmt::Debug for LoadingCache<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoadingCache")
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .field("loads", &self.loads.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    fn loading(capacity: usize) -> LoadingCache<String, usize> {
        LoadingCache::new(ShardedCache::new(capacity, 4), Duration::ZERO)
    }

    #[test]
    fn test_computes_once_then_hits() {
        let cache = loading(64);
        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let v = cache.get_or_compute("ls".to_string(), |k| {
                calls.fetch_add(1, Ordering::SeqCst);
                k.len()
            });
            assert_eq!(v, 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loads(), 1);
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = loading(64);
        let err: Result<usize, &str> = cache.try_get_or_compute("k".to_string(), |_| Err("down"));
        assert_eq!(err, Err("down"));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.in_flight_len(), 0);

        let ok: Result<usize, &str> = cache.try_get_or_compute("k".to_string(), |_| Ok(7));
        assert_eq!(ok, Ok(7));
        assert_eq!(cache.get("k"), Some(7));
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let cache = loading(64);
        cache.get_or_compute("k".to_string(), |_| 1);
        assert_eq!(cache.invalidate("k"), Some(1));
        assert_eq!(cache.get_or_compute("k".to_string(), |_| 2), 2);
        assert_eq!(cache.loads(), 2);
        assert_eq!(cache.metrics().get("loads"), Some(&2.0));
    }

    #[test]
    fn test_miss_storm_computes_once() {
        let cache = Arc::new(loading(64));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute("hot".to_string(), |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        42
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[test]
    fn test_panicking_loader_releases_gate() {
        let cache = Arc::new(loading(64));
        let c = Arc::clone(&cache);
        let result = thread::spawn(move || c.get_or_compute("k".to_string(), |_| panic!("boom")))
            .join();
        assert!(result.is_err());
        assert_eq!(cache.in_flight_len(), 0);
        assert_eq!(cache.get_or_compute("k".to_string(), |_| 3), 3);
    }
}

//! A single cache shard: an arena-backed recency list plus a key index.
//!
//! The shard is the single-threaded core of [`ShardedCache`](super::ShardedCache);
//! all locking happens one level up. Each shard owns its arena outright, so
//! `prev`/`next` links are plain indices and there is nothing to alias.
//!
//! Invariants (checked by `validate()` in tests):
//! - every key in `items` maps to exactly one node reachable from the list
//!   head, and the walk terminates at the tail;
//! - `items.len() == list.len() <= capacity`;
//! - list order is recency order, most recently used first;
//! - `ttl_entries` equals the number of entries carrying an expiry.

use super::{DefaultHashBuilder, HashMap};
use crate::entry::CacheEntry;
use crate::list::{List, NodeId};
use crate::metrics::ShardMetrics;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::trace;

/// What a read-locked probe found for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    Absent,
    Expired,
    Live,
}

pub(crate) struct CacheShard<K, V, S = DefaultHashBuilder> {
    list: List<CacheEntry<K, V>>,
    items: HashMap<K, NodeId, S>,
    ttl_entries: usize,
    metrics: ShardMetrics,
}

impl<K: Hash + Eq, V, S: BuildHasher> CacheShard<K, V, S> {
    pub(crate) fn with_hasher(cap: NonZeroUsize, hash_builder: S) -> Self {
        CacheShard {
            list: List::new(cap),
            items: HashMap::with_capacity_and_hasher(cap.get().min(1024), hash_builder),
            ttl_entries: 0,
            metrics: ShardMetrics::default(),
        }
    }

    #[inline]
    pub(crate) fn cap(&self) -> NonZeroUsize {
        self.list.cap()
    }

    /// Number of stored entries, including expired ones not yet removed.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Number of entries that have not expired as of `now`.
    pub(crate) fn live_len(&self, now: Instant) -> usize {
        if self.ttl_entries == 0 {
            return self.items.len();
        }
        self.list.iter().filter(|e| !e.is_expired_at(now)).count()
    }

    #[inline]
    pub(crate) fn metrics(&self) -> &ShardMetrics {
        &self.metrics
    }

    fn entry<Q>(&self, key: &Q) -> Option<(NodeId, &CacheEntry<K, V>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = *self.items.get(key)?;
        self.list.get_value(id).map(|e| (id, e))
    }

    /// Classifies a key without mutating anything; safe under a read lock.
    pub(crate) fn probe<Q>(&self, key: &Q, now: Instant) -> Probe
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.entry(key) {
            None => Probe::Absent,
            Some((_, e)) if e.is_expired_at(now) => Probe::Expired,
            Some(_) => Probe::Live,
        }
    }

    /// Returns a live value without touching recency.
    pub(crate) fn peek<Q>(&self, key: &Q, now: Instant) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.entry(key)
            .filter(|(_, e)| !e.is_expired_at(now))
            .map(|(_, e)| &e.value)
    }

    pub(crate) fn access_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.entry(key).map(|(_, e)| e.access_count())
    }

    /// Looks up a key, moving it to the front on a hit.
    ///
    /// An expired entry is removed and reported as a miss.
    pub(crate) fn get<Q>(&mut self, key: &Q, now: Instant) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = *self.items.get(key)?;
        if self.list.get_value(id)?.is_expired_at(now) {
            self.unlink(id);
            self.metrics.expirations += 1;
            return None;
        }
        self.list.move_to_front(id);
        let entry = self.list.get_value_mut(id)?;
        entry.touch();
        Some(&entry.value)
    }

    /// Removes `key` if it is present and expired. Returns `true` if removed.
    pub(crate) fn remove_if_expired<Q>(&mut self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let expired = match self.entry(key) {
            Some((id, e)) if e.is_expired_at(now) => Some(id),
            _ => None,
        };
        match expired {
            Some(id) => {
                self.unlink(id);
                self.metrics.expirations += 1;
                true
            }
            None => false,
        }
    }

    /// Inserts or updates a key at the front of the recency list.
    ///
    /// Returns the previous value for an update, or the evicted pair when a
    /// live entry had to make room.
    pub(crate) fn set(&mut self, key: K, value: V, ttl: Duration, now: Instant) -> Option<(K, V)>
    where
        K: Clone,
    {
        if let Some(&id) = self.items.get(&key) {
            let entry = self.list.get_value_mut(id)?;
            let had_ttl = entry.has_ttl();
            let old = entry.refresh(value, ttl);
            let has_ttl = entry.has_ttl();
            self.adjust_ttl_count(had_ttl, has_ttl);
            self.list.move_to_front(id);
            self.metrics.updates += 1;
            return Some((key, old));
        }

        let mut evicted = None;
        if self.list.is_full() {
            self.evict_expired_tail(now);
        }
        if self.list.is_full() {
            if let Some(id) = self.list.last() {
                if let Some(entry) = self.unlink(id) {
                    trace!(capacity = self.cap().get(), "evicted least recently used entry");
                    self.metrics.evictions += 1;
                    evicted = Some((entry.key, entry.value));
                }
            }
        }

        let entry = CacheEntry::new(key.clone(), value, ttl);
        if entry.has_ttl() {
            self.ttl_entries += 1;
        }
        let id = self.list.add(entry);
        self.items.insert(key, id);
        self.metrics.insertions += 1;
        evicted
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = *self.items.get(key)?;
        let entry = self.unlink(id)?;
        self.metrics.removals += 1;
        Some(entry.value)
    }

    /// Drops every entry whose TTL has passed. Returns how many were dropped.
    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        if self.ttl_entries == 0 {
            return 0;
        }
        let mut expired = Vec::new();
        let mut cursor = self.list.last();
        while let Some(id) = cursor {
            if self.list.get_value(id).is_some_and(|e| e.is_expired_at(now)) {
                expired.push(id);
            }
            cursor = self.list.prev_of(id);
        }
        for &id in &expired {
            self.unlink(id);
        }
        self.metrics.expirations += expired.len() as u64;
        if !expired.is_empty() {
            trace!(count = expired.len(), "purged expired entries");
        }
        expired.len()
    }

    /// Resets the list and map. Metrics are kept.
    pub(crate) fn clear(&mut self) {
        self.list.clear();
        self.items.clear();
        self.ttl_entries = 0;
    }

    fn evict_expired_tail(&mut self, now: Instant) {
        while let Some(id) = self.list.last() {
            if !self.list.get_value(id).is_some_and(|e| e.is_expired_at(now)) {
                break;
            }
            self.unlink(id);
            self.metrics.expirations += 1;
        }
    }

    fn unlink(&mut self, id: NodeId) -> Option<CacheEntry<K, V>> {
        let entry = self.list.remove(id)?;
        self.items.remove(&entry.key);
        if entry.has_ttl() {
            self.ttl_entries -= 1;
        }
        Some(entry)
    }

    fn adjust_ttl_count(&mut self, had_ttl: bool, has_ttl: bool) {
        match (had_ttl, has_ttl) {
            (false, true) => self.ttl_entries += 1,
            (true, false) => self.ttl_entries -= 1,
            _ => {}
        }
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    pub(crate) fn keys_by_recency(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.list.iter().map(|e| e.key.clone()).collect()
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) {
        self.list.validate();
        assert_eq!(self.items.len(), self.list.len());
        for (key, &id) in self.items.iter() {
            let entry = self.list.get_value(id).expect("indexed node must be live");
            assert!(entry.key == *key, "index points at the wrong node");
        }
        let with_ttl = self.list.iter().filter(|e| e.has_ttl()).count();
        assert_eq!(with_ttl, self.ttl_entries);
    }
}

impl<K, V, S> core::fmt::Debug for CacheShard<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheShard")
            .field("capacity", &self.list.cap())
            .field("len", &self.list.len())
            .field("ttl_entries", &self.ttl_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn shard(cap: usize) -> CacheShard<&'static str, i32> {
        CacheShard::with_hasher(NonZeroUsize::new(cap).unwrap(), DefaultHashBuilder::default())
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut s = shard(2);
        let now = Instant::now();
        s.set("a", 1, Duration::ZERO, now);
        s.set("b", 2, Duration::ZERO, now);
        let evicted = s.set("c", 3, Duration::ZERO, now);
        assert_eq!(evicted, Some(("a", 1)));
        assert_eq!(s.get(&"a", now), None);
        assert_eq!(s.get(&"b", now), Some(&2));
        assert_eq!(s.get(&"c", now), Some(&3));
        assert_eq!(s.metrics().evictions, 1);
        s.validate();
    }

    #[test]
    fn test_get_moves_to_front() {
        let mut s = shard(3);
        let now = Instant::now();
        s.set("a", 1, Duration::ZERO, now);
        s.set("b", 2, Duration::ZERO, now);
        s.set("c", 3, Duration::ZERO, now);
        assert_eq!(s.keys_by_recency(), vec!["c", "b", "a"]);

        s.get(&"a", now);
        assert_eq!(s.keys_by_recency(), vec!["a", "c", "b"]);

        s.set("d", 4, Duration::ZERO, now);
        assert_eq!(s.keys_by_recency(), vec!["d", "a", "c"]);
        s.validate();
    }

    #[test]
    fn test_update_moves_to_front_without_growing() {
        let mut s = shard(3);
        let now = Instant::now();
        s.set("a", 1, Duration::ZERO, now);
        s.set("b", 2, Duration::ZERO, now);
        assert_eq!(s.set("a", 10, Duration::ZERO, now), Some(("a", 1)));
        assert_eq!(s.len(), 2);
        assert_eq!(s.keys_by_recency(), vec!["a", "b"]);
        assert_eq!(s.metrics().updates, 1);
        s.validate();
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let mut s = shard(4);
        s.set("a", 1, Duration::from_millis(5), Instant::now());
        assert_eq!(s.probe(&"a", Instant::now()), Probe::Live);
        let later = Instant::now() + Duration::from_millis(10);
        assert_eq!(s.probe(&"a", later), Probe::Expired);
        assert_eq!(s.peek(&"a", later), None);
        assert_eq!(s.get(&"a", later), None);
        assert_eq!(s.probe(&"a", later), Probe::Absent);
        assert_eq!(s.len(), 0);
        assert_eq!(s.metrics().expirations, 1);
        s.validate();
    }

    #[test]
    fn test_full_shard_prefers_expired_tail() {
        let mut s = shard(2);
        let now = Instant::now();
        s.set("old", 1, Duration::from_millis(1), now);
        s.set("keep", 2, Duration::ZERO, now);
        thread::sleep(Duration::from_millis(5));
        let evicted = s.set("new", 3, Duration::ZERO, Instant::now());
        assert_eq!(evicted, None);
        assert_eq!(s.metrics().expirations, 1);
        assert_eq!(s.metrics().evictions, 0);
        assert_eq!(s.keys_by_recency(), vec!["new", "keep"]);
        s.validate();
    }

    #[test]
    fn test_live_len_excludes_expired() {
        let mut s = shard(8);
        let now = Instant::now();
        s.set("a", 1, Duration::from_millis(5), now);
        s.set("b", 2, Duration::ZERO, now);
        let later = now + Duration::from_millis(10);
        assert_eq!(s.len(), 2);
        assert_eq!(s.live_len(later), 1);
    }

    #[test]
    fn test_purge_expired() {
        let mut s = shard(8);
        let now = Instant::now();
        s.set("a", 1, Duration::from_millis(5), now);
        s.set("b", 2, Duration::ZERO, now);
        s.set("c", 3, Duration::from_millis(5), now);
        let later = now + Duration::from_millis(10);
        assert_eq!(s.purge_expired(later), 2);
        assert_eq!(s.keys_by_recency(), vec!["b"]);
        assert_eq!(s.purge_expired(later), 0);
        s.validate();
    }

    #[test]
    fn test_ttl_count_tracks_updates() {
        let mut s = shard(4);
        let now = Instant::now();
        s.set("a", 1, Duration::from_secs(60), now);
        s.set("a", 2, Duration::ZERO, now);
        s.validate();
        s.set("a", 3, Duration::from_secs(60), now);
        s.validate();
        s.remove(&"a");
        s.validate();
    }

    #[test]
    fn test_access_count_and_remove() {
        let mut s = shard(4);
        let now = Instant::now();
        s.set("a", 1, Duration::ZERO, now);
        s.get(&"a", now);
        s.get(&"a", now);
        assert_eq!(s.access_count(&"a"), Some(2));
        assert_eq!(s.remove(&"a"), Some(1));
        assert_eq!(s.remove(&"a"), None);
        assert_eq!(s.metrics().removals, 1);
    }

    #[test]
    fn test_clear_resets_structure() {
        let mut s = shard(4);
        let now = Instant::now();
        s.set("a", 1, Duration::from_secs(1), now);
        s.set("b", 2, Duration::ZERO, now);
        s.clear();
        assert_eq!(s.len(), 0);
        s.validate();
        s.set("c", 3, Duration::ZERO, now);
        assert_eq!(s.peek(&"c", now), Some(&3));
    }
}

//! Cache entry type.
//!
//! A [`CacheEntry`] is what a cache shard stores in each node of its recency
//! list: the key (duplicated from the shard's index map so eviction can find
//! the map slot), the value, an optional absolute expiry and an advisory
//! access counter.
//!
//! # Expiry
//!
//! Expiry is an absolute [`Instant`]. `None` means the entry never expires.
//! A TTL of [`Duration::ZERO`] at insertion time is treated as "no expiry",
//! matching the `set(k, v, 0)` convention used by callers.
//!
//! ```
//! use cmdhint_core::CacheEntry;
//! use std::time::Duration;
//!
//! let forever = CacheEntry::new("git st", vec!["git status"], Duration::ZERO);
//! assert!(forever.expires_at().is_none());
//!
//! let short = CacheEntry::new("git co", vec!["git checkout"], Duration::from_secs(30));
//! assert!(!short.is_expired());
//! ```

use core::fmt;
use std::time::{Duration, Instant};

/// A cached key/value pair with optional expiry.
pub struct CacheEntry<K, V> {
    /// The cached key
    pub key: K,

    /// The cached value
    pub value: V,

    /// Absolute expiry; `None` never expires.
    expires_at: Option<Instant>,

    /// Number of hits served from this entry. Advisory only.
    access_count: u64,
}

impl<K, V> CacheEntry<K, V> {
    /// Creates an entry that expires `ttl` from now (`ttl == 0` never expires).
    #[inline]
    pub fn new(key: K, value: V, ttl: Duration) -> Self {
        Self {
            key,
            value,
            expires_at: deadline_for(ttl),
            access_count: 0,
        }
    }

    /// Returns the absolute expiry instant, if any.
    #[inline]
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Returns `true` if the entry has an expiry and it is in the past.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against a caller-supplied clock.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Replaces value and expiry, keeping the access counter.
    #[inline]
    pub fn refresh(&mut self, value: V, ttl: Duration) -> V {
        self.expires_at = deadline_for(ttl);
        core::mem::replace(&mut self.value, value)
    }

    /// Records a hit.
    #[inline]
    pub fn touch(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Returns how many hits this entry has served.
    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Returns `true` if this entry carries an expiry at all.
    #[inline]
    pub fn has_ttl(&self) -> bool {
        self.expires_at.is_some()
    }
}

fn deadline_for(ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        Instant::now().checked_add(ttl)
    }
}

impl<K: Clone, V: Clone> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            expires_at: self.expires_at,
            access_count: self.access_count,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("expires_at", &self.expires_at)
            .field("access_count", &self.access_count)
            .finish()
    }
}

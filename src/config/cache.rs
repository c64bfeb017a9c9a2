//! Configuration for the sharded TTL-aware LRU cache.
//!
//! # Sizing
//!
//! - **`shards`** is rounded up to the next power of two so a key's shard can
//!   be picked with a mask instead of a division.
//! - **`capacity`** is split evenly across shards. Each shard gets
//!   `max(capacity / shards, min(16, capacity))` entries, so small caches
//!   spread across many shards still hold a useful number of entries per
//!   shard, while a tiny cache is never inflated past what was asked for.
//!
//! ```text
//! capacity = 100, shards = 16  → 16 shards × 16 entries (floor applies)
//! capacity = 4096, shards = 12 → 16 shards × 256 entries
//! capacity = 2, shards = 1     → 1 shard × 2 entries
//! ```
//!
//! The total number of live entries never exceeds
//! `shard_count() × per_shard_capacity()`.

use crate::error::ConfigError;
use core::fmt;
use core::num::NonZeroUsize;

/// Minimum per-shard capacity, unless the whole cache is smaller than this.
pub const MIN_SHARD_CAPACITY: usize = 16;

/// Largest supported shard count; larger requests are clamped to it.
pub const MAX_SHARDS: usize = 1 << 16;

/// Returns the default number of shards based on available parallelism.
///
/// Four shards per CPU, clamped to `4..=64` and rounded to a power of two.
pub fn default_shard_count() -> usize {
    (super::available_parallelism() * 4)
        .clamp(4, 64)
        .next_power_of_two()
}

/// Configuration for a [`ShardedCache`](crate::ShardedCache).
///
/// # Examples
///
/// ```
/// use cmdhint_core::config::ShardedCacheConfig;
/// use core::num::NonZeroUsize;
///
/// let config = ShardedCacheConfig {
///     capacity: NonZeroUsize::new(100).unwrap(),
///     shards: 16,
/// };
/// assert_eq!(config.shard_count(), 16);
/// assert_eq!(config.per_shard_capacity().get(), 16);
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardedCacheConfig {
    /// Requested total number of entries across all shards.
    pub capacity: NonZeroUsize,
    /// Requested number of independently locked shards (rounded up to a power of two).
    pub shards: usize,
}

impl ShardedCacheConfig {
    /// Creates a config with the default shard count.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            shards: default_shard_count(),
        }
    }

    /// Actual number of shards: `shards` clamped to `1..=MAX_SHARDS` and
    /// rounded up to a power of two.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.clamp(1, MAX_SHARDS).next_power_of_two()
    }

    /// Capacity of each individual shard.
    #[inline]
    pub fn per_shard_capacity(&self) -> NonZeroUsize {
        let capacity = self.capacity.get();
        let even_split = capacity / self.shard_count();
        let floor = MIN_SHARD_CAPACITY.min(capacity);
        // floor >= 1 because capacity is non-zero
        NonZeroUsize::new(even_split.max(floor)).unwrap_or(NonZeroUsize::MIN)
    }

    /// Upper bound on the number of live entries.
    #[inline]
    pub fn total_capacity(&self) -> usize {
        self.shard_count() * self.per_shard_capacity().get()
    }

    /// Checks the config for values that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 {
            return Err(ConfigError::Zero("shards"));
        }
        if self.shards > MAX_SHARDS {
            return Err(ConfigError::Invalid {
                field: "shards",
                reason: "more than 65536 shards is not supported",
            });
        }
        Ok(())
    }
}

impl Default for ShardedCacheConfig {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(4096).unwrap_or(NonZeroUsize::MIN))
    }
}

impl fmt::Debug for ShardedCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedCacheConfig")
            .field("capacity", &self.capacity)
            .field("shards", &self.shards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize, shards: usize) -> ShardedCacheConfig {
        ShardedCacheConfig {
            capacity: NonZeroUsize::new(capacity).unwrap(),
            shards,
        }
    }

    #[test]
    fn test_shard_count_rounds_to_power_of_two() {
        assert_eq!(config(100, 1).shard_count(), 1);
        assert_eq!(config(100, 3).shard_count(), 4);
        assert_eq!(config(100, 16).shard_count(), 16);
        assert_eq!(config(100, 17).shard_count(), 32);
    }

    #[test]
    fn test_huge_shard_request_is_clamped() {
        assert_eq!(config(100, usize::MAX).shard_count(), MAX_SHARDS);
        assert_eq!(config(100, MAX_SHARDS + 1).shard_count(), MAX_SHARDS);
        assert_eq!(config(100, usize::MAX).total_capacity(), MAX_SHARDS * 16);
    }

    #[test]
    fn test_per_shard_capacity_floor() {
        assert_eq!(config(100, 16).per_shard_capacity().get(), 16);
        assert_eq!(config(4096, 12).per_shard_capacity().get(), 256);
        assert_eq!(config(2, 1).per_shard_capacity().get(), 2);
        assert_eq!(config(10, 16).per_shard_capacity().get(), 10);
    }

    #[test]
    fn test_total_capacity() {
        assert_eq!(config(100, 16).total_capacity(), 256);
        assert_eq!(config(2, 1).total_capacity(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(config(10, 4).validate().is_ok());
        assert_eq!(config(10, 0).validate(), Err(ConfigError::Zero("shards")));
        assert!(config(10, 1 << 17).validate().is_err());
    }

    #[test]
    fn test_default_shard_count_is_power_of_two() {
        let n = default_shard_count();
        assert!(n.is_power_of_two());
        assert!((4..=64).contains(&n));
    }
}

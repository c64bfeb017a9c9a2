//! Sharded TTL-aware LRU cache and its wrappers.
//!
//! The suggestion layer memoizes per-query result sets here with a short TTL.
//! Keys are routed to one of a power-of-two number of shards; each shard is an
//! independent LRU protected by its own `parking_lot::RwLock`.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                      ShardedCache (N = 2^k shards)                 │
//! │                                                                    │
//! │  (hash(key) >> 32) & (N - 1)  ──▶  shard                           │
//! │                                                                    │
//! │  ┌──────────┐ ┌──────────┐              ┌──────────┐               │
//! │  │ Shard 0  │ │ Shard 1  │     ...      │ Shard N-1│               │
//! │  │ [RwLock] │ │ [RwLock] │              │ [RwLock] │               │
//! │  │  map +   │ │  map +   │              │  map +   │               │
//! │  │  arena   │ │  arena   │              │  arena   │               │
//! │  └──────────┘ └──────────┘              └──────────┘               │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why RwLock Instead of Mutex?
//!
//! A strict LRU `get` has to reorder the list, so every hit still ends up
//! under the write lock. The read lock earns its keep on the paths that do
//! not reorder: misses, [`peek`](ShardedCache::peek), `len()` and the
//! "is this entry expired?" probe that precedes every `get`.
//!
//! Recency order is strict within a shard. There is no global order across
//! shards, and no operation ever holds more than one shard lock at a time.
//!
//! ## Wrappers
//!
//! | Type | Adds |
//! |------|------|
//! | [`LoadingCache`] | compute-on-miss; concurrent misses for one key compute once |
//! | [`StatsCache`] | lock-free hit/miss counters |

mod loading;
mod shard;
mod sharded;
mod stats;

pub use self::loading::LoadingCache;
pub use self::sharded::ShardedCache;
pub use self::stats::StatsCache;

#[cfg(feature = "hashbrown")]
pub(crate) use hashbrown::{DefaultHashBuilder, HashMap};

#[cfg(not(feature = "hashbrown"))]
pub(crate) use std::collections::{hash_map::RandomState as DefaultHashBuilder, HashMap};

//! Configuration Module
//!
//! This module provides configuration structures for every component in the
//! crate. Each component has its own dedicated configuration struct with
//! public fields, a `Default` tuned for an interactive CLI, and a
//! `validate()` method that rejects nonsensical values before any thread is
//! spawned or any memory is reserved.
//!
//! # Design Philosophy
//!
//! Configuration structs have all public fields for simple instantiation:
//!
//! - **Simple**: Just create the struct with all fields set
//! - **Type safety**: All parameters must be provided at construction
//! - **Validated once**: `init(config)` constructors call `validate()` for you
//!
//! Enable the `serde` feature to load these structs from the application's
//! own configuration file.
//!
//! # Available Configs
//!
//! | Config | Component |
//! |--------|-----------|
//! | [`ShardedCacheConfig`] | [`ShardedCache`](crate::ShardedCache) |
//! | [`WorkerPoolConfig`] | [`WorkerPool`](crate::WorkerPool) |
//! | [`AdaptivePoolConfig`] | [`AdaptivePool`](crate::AdaptivePool) |
//! | [`PriorityPoolConfig`] | [`PriorityPool`](crate::PriorityPool) |
//! | [`RateLimiterConfig`] | [`RateLimiter`](crate::RateLimiter) |
//! | [`CircuitBreakerConfig`] | [`CircuitBreaker`](crate::CircuitBreaker) |
//!
//! # Examples
//!
//! ```
//! use cmdhint_core::config::ShardedCacheConfig;
//! use cmdhint_core::ShardedCache;
//! use core::num::NonZeroUsize;
//!
//! let config = ShardedCacheConfig {
//!     capacity: NonZeroUsize::new(4096).unwrap(),
//!     shards: 12, // rounded up to 16
//! };
//! let cache: ShardedCache<String, Vec<String>> = ShardedCache::init(config);
//! assert_eq!(cache.shard_count(), 16);
//! ```

pub mod cache;
pub mod pool;
pub mod resilience;

pub use cache::ShardedCacheConfig;
pub use pool::{AdaptivePoolConfig, PriorityPoolConfig, WorkerPoolConfig};
pub use resilience::{CircuitBreakerConfig, RateLimiterConfig};

/// Number of logical CPUs, falling back to 4 when it cannot be determined.
pub(crate) fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

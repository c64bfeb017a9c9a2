#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Component Map
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        suggestion / search layer                      │
//! └──────┬──────────────────────┬──────────────────────────┬─────────────┘
//!        │ memoize              │ fan out                  │ outbound calls
//!        ▼                      ▼                          ▼
//! ┌──────────────┐   ┌─────────────────────────┐   ┌───────────────────┐
//! │ ShardedCache │   │ WorkerPool  (RingBuffer)│   │ RateLimiter       │
//! │ LoadingCache │   │ AdaptivePool (channel)  │   │ CircuitBreaker    │
//! │ StatsCache   │   │ PriorityPool (3 queues) │   └───────────────────┘
//! └──────────────┘   └─────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | What it does | Blocking? |
//! |------|--------------|-----------|
//! | [`ShardedCache`] | TTL-aware LRU split into independently locked shards | shard lock only |
//! | [`RingBuffer`] | bounded MPMC FIFO | never |
//! | [`WorkerPool`] | fixed workers busy-polling a ring buffer | `submit_wait` only |
//! | [`AdaptivePool`] | workers grow toward `max` under load, shrink when idle | never |
//! | [`PriorityPool`] | strict high > medium > low scheduling | never |
//! | [`RateLimiter`] | token bucket, full refill once per interval | `wait` only |
//! | [`CircuitBreaker`] | closed / open / half-open failure isolation | never |
//!
//! ## Error Model
//!
//! - A cache miss is `None`, never an error.
//! - Back-pressure (`QueueFull`, `Inactive`) is returned to the caller
//!   immediately; `submit` reports it as `false`.
//! - A task's error or panic becomes an [`Outcome`]; the worker keeps running.
//! - An open breaker fails fast with [`BreakerError::Open`], distinct from
//!   [`BreakerError::Failed`].
//!
//! Nothing here retries on its own.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (pool lifecycle at `debug`, evictions at
//! `trace`, breaker transitions at `info`, unhandled task panics at `warn`).
//! It never installs a subscriber.
//!
//! ## Modules
//!
//! - [`cache`]: sharded cache and its loading/stats wrappers
//! - [`ring`]: lock-free bounded ring buffer
//! - [`pool`]: fixed, adaptive and priority worker pools, plus [`pool::fan_out`]
//! - [`resilience`]: rate limiter and circuit breaker
//! - [`context`]: cancellation and deadlines handed to tasks
//! - [`config`]: configuration structures for every component
//! - [`metrics`]: counters reported through [`CacheMetrics`]
//! - [`error`]: error types

/// Cache entry type.
///
/// Holds key, value, optional absolute expiry and an advisory hit counter.
pub mod entry;

/// Arena-backed doubly linked list used for recency order.
///
/// Internal infrastructure; nodes are addressed by index, not pointer.
pub(crate) mod list;

/// Configuration structures for every component.
pub mod config;

/// Error types.
pub mod error;

/// Cancellation tokens with optional deadlines.
pub mod context;

/// Cache metrics system.
///
/// Every cache reports its counters through a common trait as a
/// deterministic `BTreeMap`.
pub mod metrics;

/// Sharded TTL-aware LRU cache.
///
/// Keys are routed to independently locked shards; each shard keeps strict
/// recency order and per-entry expiry.
pub mod cache;

/// Bounded lock-free ring buffer.
pub mod ring;

/// Worker pools: fixed, adaptive and priority.
pub mod pool;

/// Rate limiting and circuit breaking for outbound calls.
pub mod resilience;

// Re-export cache types
pub use cache::{LoadingCache, ShardedCache, StatsCache};
pub use entry::CacheEntry;
pub use metrics::CacheMetrics;

// Re-export concurrency primitives
pub use context::Context;
pub use pool::{
    AdaptivePool, Outcome, PoolStats, Priority, PriorityPool, Task, TaskResult, WorkerPool,
};
pub use ring::RingBuffer;

// Re-export resilience types
pub use resilience::{CircuitBreaker, CircuitState, RateLimiter};

// Re-export errors
pub use error::{BoxError, BreakerError, ConfigError, ContextError, PoolError};

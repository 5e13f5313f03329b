//! Cache module providing runtime-configurable caching with multiple backends.
//!
//! This module provides a unified caching interface that supports:
//! - Memory cache (in-process, simple key-value, no key scans)
//! - Redis cache (distributed, supports pattern deletes)
//! - No-op cache (caching disabled)
//!
//! The cache is never a source of truth. [`CacheManager`] absorbs every
//! backend failure, so at worst a broken cache makes reads slower.
//!
//! # Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"  # or "redis"
//! operation_timeout_ms = 500
//!
//! [cache.memory]
//! max_size = 10000
//!
//! [cache.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 4
//! connection_timeout = 5
//! key_prefix = "timeclock"
//! ```

mod error;
pub mod keys;
mod manager;
mod memory;
mod noop;
mod redis;
mod traits;

pub use error::CacheError;
pub use keys::CacheKeyBuilder;
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use noop::NoOpCache;
pub use self::redis::RedisCache;
pub use traits::{BackendStats, CacheLookup, CacheStats, CacheStore};

#[cfg(test)]
pub(crate) use manager::testing;

// Re-export config types
pub use crate::config::settings::{CacheBackend, CacheConfig, MemoryCacheConfig, RedisCacheConfig};

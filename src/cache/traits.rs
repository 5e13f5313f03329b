//! CacheStore trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::CacheError;

/// Introspection data a backend can report about itself.
///
/// Every field is optional; backends fill in what they can see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub memory_used: Option<String>,
    pub memory_peak: Option<String>,
    pub keys_count: Option<u64>,
}

/// Trait for cache backends.
///
/// All backends must implement this trait to provide a unified interface.
/// Backends report failures as [`CacheError`]; absorbing those failures is
/// the job of [`CacheManager`](crate::cache::CacheManager).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend identifier used in logs and stats ("redis", "memory", ...).
    fn name(&self) -> &'static str;

    /// Whether [`remove_by_pattern`](Self::remove_by_pattern) is backed by a
    /// real key scan. Callers fall back to [`flush`](Self::flush) otherwise.
    fn supports_pattern_delete(&self) -> bool;

    /// Get a value from the cache.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value that expires after `ttl_seconds`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Remove a value from the cache.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every key matching a glob pattern, returning how many were removed.
    ///
    /// Backends without key enumeration return `Ok(0)` without touching
    /// anything.
    async fn remove_by_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Drop every entry owned by this backend, returning how many were removed
    /// when the backend can tell.
    async fn flush(&self) -> Result<u64, CacheError>;

    /// Best-effort introspection.
    async fn stats(&self) -> Result<BackendStats, CacheError>;
}

/// Result of a cache read as seen by callers.
///
/// `Miss` and `Unavailable` both send the caller to the source of truth, but
/// keeping them apart lets logs and stats tell an empty cache from a broken one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Unavailable,
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss | CacheLookup::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheLookup<U> {
        match self {
            CacheLookup::Hit(value) => CacheLookup::Hit(f(value)),
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::Unavailable => CacheLookup::Unavailable,
        }
    }
}

/// Cache statistics exposed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub driver: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_peak: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

//! NoOp cache implementation.
//!
//! Used when caching is disabled. Reads always miss, writes vanish.

use async_trait::async_trait;

use crate::cache::{BackendStats, CacheError, CacheStore};

/// A cache that never stores anything.
///
/// Used when `cache.enabled = false` in configuration.
pub struct NoOpCache;

impl NoOpCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for NoOpCache {
    fn name(&self) -> &'static str {
        "none"
    }

    fn supports_pattern_delete(&self) -> bool {
        // Nothing is ever stored, so a pattern delete is trivially exact.
        true
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl_seconds: u64) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove_by_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn flush(&self) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn stats(&self) -> Result<BackendStats, CacheError> {
        Ok(BackendStats {
            keys_count: Some(0),
            ..BackendStats::default()
        })
    }
}

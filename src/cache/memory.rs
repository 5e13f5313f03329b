//! Memory cache implementation using cached::SizedCache.
//!
//! The store is a plain key-value map: it cannot scan keys by pattern, so
//! namespace invalidation against it degrades to a full flush.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cached::{Cached, SizedCache};
use jiff::{SignedDuration, Timestamp};

use crate::cache::{BackendStats, CacheError, CacheStore};
use crate::clock::Clock;
use crate::config::settings::MemoryCacheConfig;

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Timestamp,
}

impl CacheEntry {
    fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// In-process LRU cache with per-entry TTL.
pub struct MemoryCache {
    store: Mutex<SizedCache<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(SizedCache::with_size(config.max_size.max(1))),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SizedCache<String, CacheEntry>>, CacheError> {
        self.store
            .lock()
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn supports_pattern_delete(&self) -> bool {
        false
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now();
        let mut store = self.lock()?;

        let expired = match store.cache_get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            store.cache_remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError> {
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let expires_at = self
            .clock
            .now()
            .checked_add(SignedDuration::from_secs(ttl))
            .unwrap_or(Timestamp::MAX);

        let mut store = self.lock()?;
        store.cache_set(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.lock()?;
        store.cache_remove(key);
        Ok(())
    }

    async fn remove_by_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn flush(&self) -> Result<u64, CacheError> {
        let mut store = self.lock()?;
        let removed = store.cache_size() as u64;
        store.cache_clear();
        Ok(removed)
    }

    async fn stats(&self) -> Result<BackendStats, CacheError> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        // Entries past their TTL linger until read; drop them so the count is live.
        store.retain(|_, entry| !entry.is_expired(now));
        Ok(BackendStats {
            keys_count: Some(store.cache_size() as u64),
            ..BackendStats::default()
        })
    }
}

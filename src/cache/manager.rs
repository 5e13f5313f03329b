//! Cache manager that dispatches to the configured backend.
//!
//! This is where backend failures stop. Every call is bounded by the
//! configured operation timeout, and every error is logged with the key or
//! pattern involved and then converted into a miss or a no-op. Nothing in
//! this module returns a [`CacheError`] to its callers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::memory::MemoryCache;
use crate::cache::noop::NoOpCache;
use crate::cache::redis::RedisCache;
use crate::cache::{CacheError, CacheLookup, CacheStats, CacheStore};
use crate::clock::Clock;
use crate::config::settings::{CacheBackend, CacheConfig};

const NO_MEMORY_STATS: &str = "Detailed memory statistics are only available for the redis backend";

/// Cache manager that provides guarded access to the configured cache backend.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheStore>,
    operation_timeout: Duration,
}

impl CacheManager {
    /// Create a new cache manager with the given configuration.
    ///
    /// If caching is disabled, a NoOpCache is used. Failing to reach Redis at
    /// this point is reported so the operator sees a misconfiguration early;
    /// after construction the cache never fails a caller.
    pub async fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheStore> = if !config.enabled {
            Arc::new(NoOpCache::new())
        } else {
            match config.backend {
                CacheBackend::Memory => Arc::new(MemoryCache::new(&config.memory, clock)),
                CacheBackend::Redis => Arc::new(RedisCache::new(&config.redis).await?),
            }
        };

        tracing::debug!(
            backend = backend.name(),
            pattern_delete = backend.supports_pattern_delete(),
            "Cache backend ready"
        );

        Ok(Self::with_backend(
            backend,
            Duration::from_millis(config.operation_timeout_ms),
        ))
    }

    /// Wraps an already constructed backend.
    pub fn with_backend(backend: Arc<dyn CacheStore>, operation_timeout: Duration) -> Self {
        Self {
            backend,
            operation_timeout,
        }
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &Arc<dyn CacheStore> {
        &self.backend
    }

    pub fn driver(&self) -> &'static str {
        self.backend.name()
    }

    pub fn supports_pattern_delete(&self) -> bool {
        self.backend.supports_pattern_delete()
    }

    async fn guarded<T>(
        &self,
        fut: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(
                self.operation_timeout.as_millis() as u64,
            )),
        }
    }

    // ========================================================================
    // Guarded operations
    // ========================================================================

    /// Get a value from the cache.
    pub async fn get(&self, key: &str) -> CacheLookup<Vec<u8>> {
        match self.guarded(self.backend.get(key)).await {
            Ok(Some(bytes)) => CacheLookup::Hit(bytes),
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(key, error = %e, driver = self.driver(), "Cache read failed, treating as miss");
                CacheLookup::Unavailable
            }
        }
    }

    /// Store a value. Returns whether the backend accepted it.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> bool {
        match self.guarded(self.backend.set(key, value, ttl_seconds)).await {
            Ok(()) => {
                tracing::debug!(key, ttl = ttl_seconds, "Cache stored");
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, driver = self.driver(), "Cache write failed");
                false
            }
        }
    }

    /// Remove a value. Returns whether the backend confirmed the removal.
    pub async fn remove(&self, key: &str) -> bool {
        match self.guarded(self.backend.remove(key)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, driver = self.driver(), "Cache delete failed");
                false
            }
        }
    }

    /// Remove every key matching `pattern`.
    ///
    /// Backends that cannot scan keys are flushed entirely instead; a stale
    /// listing is worse than a cold cache. Returns the number of entries the
    /// backend reported removing (0 on failure).
    pub async fn remove_by_pattern(&self, pattern: &str) -> u64 {
        if !self.backend.supports_pattern_delete() {
            return self.flush(Some(pattern)).await;
        }

        match self.guarded(self.backend.remove_by_pattern(pattern)).await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(pattern, keys_count = count, "Cache invalidated by pattern");
                }
                count
            }
            Err(e) => {
                tracing::warn!(pattern, error = %e, driver = self.driver(), "Cache pattern delete failed");
                0
            }
        }
    }

    /// Drop every entry in the backend. `reason` is the pattern that could
    /// not be honored, if any, and only feeds the log line.
    pub async fn flush(&self, reason: Option<&str>) -> u64 {
        match self.guarded(self.backend.flush()).await {
            Ok(count) => {
                tracing::info!(
                    pattern = reason.unwrap_or("*"),
                    keys_count = count,
                    driver = self.driver(),
                    "Cache flushed"
                );
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, driver = self.driver(), "Cache flush failed");
                0
            }
        }
    }

    /// Backend statistics for operators.
    pub async fn stats(&self) -> CacheStats {
        let driver = self.driver().to_string();
        match self.guarded(self.backend.stats()).await {
            Ok(stats) => {
                let message = stats
                    .memory_used
                    .is_none()
                    .then(|| NO_MEMORY_STATS.to_string());
                CacheStats {
                    driver,
                    connected: true,
                    memory_used: stats.memory_used,
                    memory_peak: stats.memory_peak,
                    keys_count: stats.keys_count,
                    message,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache stats unavailable");
                CacheStats {
                    driver,
                    connected: false,
                    memory_used: None,
                    memory_peak: None,
                    keys_count: None,
                    message: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingCache, HangingCache};
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::settings::MemoryCacheConfig;

    fn memory_manager() -> CacheManager {
        let backend = Arc::new(MemoryCache::new(
            &MemoryCacheConfig::default(),
            Arc::new(SystemClock),
        ));
        CacheManager::with_backend(backend, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_hit_and_miss() {
        let cache = memory_manager();
        assert_eq!(cache.get("k").await, CacheLookup::Miss);
        assert!(cache.set("k", vec![7], 60).await);
        assert_eq!(cache.get("k").await, CacheLookup::Hit(vec![7]));
    }

    #[tokio::test]
    async fn test_pattern_delete_falls_back_to_flush_on_simple_backend() {
        let cache = memory_manager();
        cache.set("time_records:pagination:a", vec![1], 60).await;
        cache.set("time_records:report:b", vec![2], 60).await;
        cache.set("unrelated", vec![3], 60).await;

        let removed = cache.remove_by_pattern("time_records:pagination:*").await;

        assert_eq!(removed, 3);
        assert_eq!(cache.get("unrelated").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_failing_backend_is_absorbed() {
        let cache = CacheManager::with_backend(Arc::new(FailingCache), Duration::from_millis(200));

        assert_eq!(cache.get("k").await, CacheLookup::Unavailable);
        assert!(!cache.set("k", vec![1], 60).await);
        assert!(!cache.remove("k").await);
        assert_eq!(cache.remove_by_pattern("k*").await, 0);
        assert_eq!(cache.flush(None).await, 0);

        let stats = cache.stats().await;
        assert!(!stats.connected);
        assert!(stats.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_hanging_backend_times_out() {
        let cache = CacheManager::with_backend(Arc::new(HangingCache), Duration::from_millis(20));

        assert_eq!(cache.get("k").await, CacheLookup::Unavailable);
        assert!(!cache.set("k", vec![1], 60).await);

        let stats = cache.stats().await;
        assert!(!stats.connected);
        assert_eq!(stats.error.as_deref(), Some("Cache operation timed out after 20 ms"));
    }

    #[tokio::test]
    async fn test_stats_for_simple_backend() {
        let cache = memory_manager();
        cache.set("a", vec![1], 60).await;

        let stats = cache.stats().await;
        assert!(stats.connected);
        assert_eq!(stats.driver, "memory");
        assert_eq!(stats.keys_count, Some(1));
        assert_eq!(stats.message.as_deref(), Some(NO_MEMORY_STATS));
    }

    #[tokio::test]
    async fn test_disabled_cache_uses_noop() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = CacheManager::new(&config, Arc::new(SystemClock)).await.unwrap();

        assert_eq!(cache.driver(), "none");
        assert!(cache.set("k", vec![1], 60).await);
        assert_eq!(cache.get("k").await, CacheLookup::Miss);
    }
}

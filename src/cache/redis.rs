//! Redis cache implementation using bb8 connection pool.

use std::collections::HashSet;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};

use crate::cache::{BackendStats, CacheError, CacheStore};
use crate::config::settings::RedisCacheConfig;

type RedisPool = Pool<Client>;

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 500;

/// Redis-based cache with bb8 connection pool.
///
/// Every key is stored under `{key_prefix}:` so several applications can
/// share one Redis database without stepping on each other.
pub struct RedisCache {
    pool: RedisPool,
    key_prefix: String,
}

impl RedisCache {
    pub async fn new(config: &RedisCacheConfig) -> Result<Self, CacheError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(std::time::Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// `pattern` scoped to our prefix; the prefix itself matches literally.
    fn prefixed_pattern(&self, pattern: &str) -> String {
        format!("{}:{}", escape_glob(&self.key_prefix), pattern)
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    /// Collects every distinct key matching `pattern` (already prefixed)
    /// with SCAN.
    ///
    /// SCAN is used instead of KEYS so a large keyspace does not block the
    /// server while we enumerate it.
    async fn scan_keys(&self, pattern: &str) -> Result<HashSet<String>, CacheError> {
        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;

        let mut keys = HashSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn_ref)
                .await
                .map_err(|e: RedisError| CacheError::Operation(e.to_string()))?;
            let repeated = merge_page(&mut keys, batch);
            if repeated > 0 {
                tracing::trace!(pattern, repeated, "SCAN returned keys already seen");
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

/// Adds one SCAN page to `keys` and returns how many of its keys were
/// already there. SCAN may report a key more than once.
fn merge_page(keys: &mut HashSet<String>, page: Vec<String>) -> usize {
    let total = page.len();
    let before = keys.len();
    keys.extend(page);
    total - (keys.len() - before)
}

/// Escapes glob metacharacters so `text` matches itself in a MATCH pattern.
fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pulls `field:value` out of an `INFO` reply.
fn info_field(info: &str, field: &str) -> Option<String> {
    info.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name == field).then(|| value.trim().to_string())
    })
}

#[async_trait]
impl CacheStore for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn supports_pattern_delete(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let prefixed = self.prefixed_key(key);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .get(&prefixed)
            .await
            .map_err(|e: RedisError| CacheError::Operation(e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let prefixed = self.prefixed_key(key);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .set_ex::<_, _, ()>(&prefixed, value, ttl_seconds.max(1))
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let prefixed = self.prefixed_key(key);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .del::<_, ()>(&prefixed)
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))
    }

    async fn remove_by_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.scan_keys(&self.prefixed_pattern(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .del::<_, u64>(keys.into_iter().collect::<Vec<_>>())
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))
    }

    async fn flush(&self) -> Result<u64, CacheError> {
        // Only our namespace: the database may be shared.
        self.remove_by_pattern("*").await
    }

    async fn stats(&self) -> Result<BackendStats, CacheError> {
        let info: String = {
            let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
            let conn_ref: &mut MultiplexedConnection = &mut conn;
            redis::cmd("INFO")
                .arg("memory")
                .query_async(conn_ref)
                .await
                .map_err(|e: RedisError| CacheError::Operation(e.to_string()))?
        };
        let keys = self.scan_keys(&self.prefixed_pattern("*")).await?;

        Ok(BackendStats {
            memory_used: info_field(&info, "used_memory_human"),
            memory_peak: info_field(&info, "used_memory_peak_human"),
            keys_count: Some(keys.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_REPLY: &str = "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\nused_memory_peak:2202009\r\nused_memory_peak_human:2.10M\r\n";

    #[test]
    fn test_info_field_extracts_human_values() {
        assert_eq!(info_field(INFO_REPLY, "used_memory_human").as_deref(), Some("1.00M"));
        assert_eq!(
            info_field(INFO_REPLY, "used_memory_peak_human").as_deref(),
            Some("2.10M")
        );
    }

    #[test]
    fn test_info_field_missing() {
        assert_eq!(info_field(INFO_REPLY, "maxmemory_human"), None);
        assert_eq!(info_field("", "used_memory_human"), None);
    }

    #[test]
    fn test_info_field_does_not_match_prefixes() {
        // "used_memory" must not pick up "used_memory_human".
        assert_eq!(info_field(INFO_REPLY, "used_memory").as_deref(), Some("1048576"));
    }

    #[test]
    fn test_repeated_scan_keys_are_counted_once() {
        let mut keys = HashSet::new();

        let first = merge_page(&mut keys, vec!["tc:a".into(), "tc:b".into()]);
        let second = merge_page(&mut keys, vec!["tc:b".into(), "tc:c".into(), "tc:c".into()]);

        assert_eq!(first, 0);
        assert_eq!(second, 2);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_escape_glob_makes_prefix_literal() {
        assert_eq!(escape_glob("timeclock"), "timeclock");
        assert_eq!(escape_glob("app*[1]?"), r"app\*\[1\]\?");
        assert_eq!(escape_glob(r"a\b"), r"a\\b");
    }
}

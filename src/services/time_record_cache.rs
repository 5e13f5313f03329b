//! Caching policy for time records.
//!
//! This service owns the key layout under the `time_records` prefix, the TTL
//! of every category, and the invalidation rules that keep listings honest
//! after a punch. It never fails: cache trouble shows up as misses and as
//! `warn` lines in the log.
//!
//! Key layout:
//!
//! | key                                         | category            |
//! |---------------------------------------------|---------------------|
//! | `time_records:pagination:<hash>`            | `Pagination`        |
//! | `time_records:today:user:<id>:<YYYY-MM-DD>` | `TodayRecords`      |
//! | `time_records:today:all:<YYYY-MM-DD>`       | `TodayRecords`      |
//! | `time_records:report:<hash>`                | `Report`            |
//! | `time_records:can_record:user:<id>`         | `CanRecordStatus`   |

use std::future::Future;
use std::sync::Arc;

use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{CacheKeyBuilder, CacheLookup, CacheManager, CacheStats};
use crate::clock::Clock;
use crate::error::AppResult;
use crate::models::{CanRecordStatus, Page, TimeRecordEntry, TimeRecordFilters};

/// Prefix shared by every key this service writes.
pub const KEY_PREFIX: &str = "time_records";

/// Kinds of cached data, each with its own lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Pagination,
    TodayRecords,
    Report,
    CanRecordStatus,
    Default,
}

impl CacheCategory {
    /// Time to live in seconds.
    pub fn ttl(self) -> u64 {
        match self {
            CacheCategory::Pagination => 1800,
            CacheCategory::TodayRecords => 300,
            CacheCategory::Report => 7200,
            CacheCategory::CanRecordStatus => 60,
            CacheCategory::Default => 3600,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheCategory::Pagination => "pagination",
            CacheCategory::TodayRecords => "today_records",
            CacheCategory::Report => "report",
            CacheCategory::CanRecordStatus => "can_record_status",
            CacheCategory::Default => "default",
        }
    }
}

/// What an invalidation was asked to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "user_id")]
pub enum InvalidationScope {
    User(i32),
    Pagination,
    All,
}

/// Outcome of an invalidation, for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    pub scope: InvalidationScope,
    /// Entries the backend reported removing through patterns or a flush.
    pub keys_removed: u64,
    /// The backend could not delete by pattern and was emptied instead.
    pub flushed: bool,
}

/// Parameters hashed into a pagination key.
#[derive(Serialize)]
struct PageKey<'a> {
    filters: &'a TimeRecordFilters,
    per_page: u32,
    page: u32,
}

/// Typed, TTL-aware access to cached time record data.
///
/// Cloning is cheap; clones share the cache backend.
#[derive(Clone)]
pub struct TimeRecordCacheService {
    cache: CacheManager,
    keys: CacheKeyBuilder,
    clock: Arc<dyn Clock>,
    time_zone: TimeZone,
}

impl TimeRecordCacheService {
    pub fn new(cache: CacheManager, clock: Arc<dyn Clock>, time_zone: TimeZone) -> Self {
        Self {
            cache,
            keys: CacheKeyBuilder::new(KEY_PREFIX),
            clock,
            time_zone,
        }
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.time_zone
    }

    /// The calendar day "today" refers to, in the configured zone.
    pub fn today(&self) -> Date {
        self.clock.now().to_zoned(self.time_zone.clone()).date()
    }

    // ========================================================================
    // Keys
    // ========================================================================

    pub fn pagination_key(
        &self,
        filters: &TimeRecordFilters,
        per_page: u32,
        page: u32,
    ) -> Option<String> {
        self.keys.build_key(
            CacheCategory::Pagination.as_str(),
            &PageKey {
                filters,
                per_page,
                page,
            },
        )
    }

    pub fn today_records_key(&self, user_id: i32) -> String {
        self.keys.fixed_key(&[
            "today",
            "user",
            &user_id.to_string(),
            &self.today().to_string(),
        ])
    }

    pub fn all_today_records_key(&self) -> String {
        self.keys
            .fixed_key(&["today", "all", &self.today().to_string()])
    }

    pub fn report_key<P: Serialize + ?Sized>(&self, params: &P) -> Option<String> {
        self.keys.build_key(CacheCategory::Report.as_str(), params)
    }

    pub fn can_record_key(&self, user_id: i32) -> String {
        self.keys
            .fixed_key(&["can_record", "user", &user_id.to_string()])
    }

    /// Key for ad hoc data that has no dedicated category.
    pub fn generic_key<P: Serialize + ?Sized>(&self, category: &str, params: &P) -> Option<String> {
        self.keys.build_key(category, params)
    }

    // ========================================================================
    // Typed reads and writes
    // ========================================================================

    /// Reads and decodes `key`. A payload that no longer decodes is dropped
    /// and reported as a miss.
    pub async fn fetch<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let bytes = match self.cache.get(key).await {
            CacheLookup::Hit(bytes) => bytes,
            CacheLookup::Miss => return CacheLookup::Miss,
            CacheLookup::Unavailable => return CacheLookup::Unavailable,
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                CacheLookup::Hit(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.cache.remove(key).await;
                CacheLookup::Miss
            }
        }
    }

    /// Encodes and stores `value` with the category's TTL.
    pub async fn store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        category: CacheCategory,
    ) -> bool {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.cache.set(key, bytes, category.ttl()).await,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache value is not serializable");
                false
            }
        }
    }

    /// Read-through: returns the cached value, or computes, stores and
    /// returns it. Only successful computations are stored. Without a key
    /// the cache is bypassed.
    pub async fn remember<T, F, Fut>(
        &self,
        key: Option<&str>,
        category: CacheCategory,
        compute: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let Some(key) = key else {
            return compute().await;
        };

        if let CacheLookup::Hit(value) = self.fetch(key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.store(key, &value, category).await;
        Ok(value)
    }

    pub async fn get_paged_records(
        &self,
        filters: &TimeRecordFilters,
        per_page: u32,
        page: u32,
    ) -> CacheLookup<Page<TimeRecordEntry>> {
        match self.pagination_key(filters, per_page, page) {
            Some(key) => self.fetch(&key).await,
            None => CacheLookup::Miss,
        }
    }

    pub async fn cache_paged_records(
        &self,
        filters: &TimeRecordFilters,
        per_page: u32,
        page: u32,
        records: &Page<TimeRecordEntry>,
    ) -> bool {
        match self.pagination_key(filters, per_page, page) {
            Some(key) => self.store(&key, records, CacheCategory::Pagination).await,
            None => false,
        }
    }

    /// Today's records for one user, or for everyone when `user_id` is `None`.
    pub async fn get_today_records(&self, user_id: Option<i32>) -> CacheLookup<Vec<TimeRecordEntry>> {
        self.fetch(&self.today_key(user_id)).await
    }

    pub async fn cache_today_records(
        &self,
        user_id: Option<i32>,
        records: &[TimeRecordEntry],
    ) -> bool {
        let key = self.today_key(user_id);
        self.store(&key, records, CacheCategory::TodayRecords)
            .await
    }

    pub async fn get_report<P, T>(&self, params: &P) -> CacheLookup<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        match self.report_key(params) {
            Some(key) => self.fetch(&key).await,
            None => CacheLookup::Miss,
        }
    }

    pub async fn cache_report<P, T>(&self, params: &P, report: &T) -> bool
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        match self.report_key(params) {
            Some(key) => self.store(&key, report, CacheCategory::Report).await,
            None => false,
        }
    }

    pub async fn get_can_record(&self, user_id: i32) -> CacheLookup<CanRecordStatus> {
        self.fetch(&self.can_record_key(user_id)).await
    }

    pub async fn cache_can_record(&self, user_id: i32, status: &CanRecordStatus) -> bool {
        let key = self.can_record_key(user_id);
        self.store(&key, status, CacheCategory::CanRecordStatus)
            .await
    }

    pub(crate) fn today_key(&self, user_id: Option<i32>) -> String {
        match user_id {
            Some(id) => self.today_records_key(id),
            None => self.all_today_records_key(),
        }
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Drops everything a new record by `user_id` could make stale: the
    /// user's today list and punch status, today's list for everyone, and
    /// every listing and report.
    pub async fn invalidate_user_cache(&self, user_id: i32) -> InvalidationReport {
        let exact = [
            self.today_records_key(user_id),
            self.can_record_key(user_id),
            self.all_today_records_key(),
        ];
        for key in &exact {
            self.cache.remove(key).await;
        }

        let patterns = [
            self.keys
                .fixed_key(&["today", "user", &user_id.to_string(), "*"]),
            self.keys.fixed_key(&["today", "all", "*"]),
            self.keys.namespace_pattern(CacheCategory::Pagination.as_str()),
            self.keys.namespace_pattern(CacheCategory::Report.as_str()),
        ];
        let report = self
            .remove_patterns(InvalidationScope::User(user_id), &patterns)
            .await;

        tracing::info!(
            user_id,
            keys_removed = report.keys_removed,
            flushed = report.flushed,
            "User cache invalidated"
        );
        report
    }

    /// Drops every cached listing page.
    pub async fn invalidate_pagination_cache(&self) -> InvalidationReport {
        let pattern = self
            .keys
            .namespace_pattern(CacheCategory::Pagination.as_str());
        let report = self
            .remove_patterns(InvalidationScope::Pagination, &[pattern])
            .await;

        tracing::info!(
            keys_removed = report.keys_removed,
            flushed = report.flushed,
            "Pagination cache invalidated"
        );
        report
    }

    /// Drops every key under the `time_records` prefix.
    pub async fn invalidate_all_cache(&self) -> InvalidationReport {
        let pattern = self.keys.prefix_pattern();
        let report = self
            .remove_patterns(InvalidationScope::All, &[pattern])
            .await;

        tracing::info!(
            keys_removed = report.keys_removed,
            flushed = report.flushed,
            "All time record cache invalidated"
        );
        report
    }

    /// Pattern-deletes each pattern, or flushes the store once when it
    /// cannot match keys.
    async fn remove_patterns(
        &self,
        scope: InvalidationScope,
        patterns: &[String],
    ) -> InvalidationReport {
        if !self.cache.supports_pattern_delete() {
            let keys_removed = self.cache.flush(patterns.first().map(String::as_str)).await;
            return InvalidationReport {
                scope,
                keys_removed,
                flushed: true,
            };
        }

        let mut keys_removed = 0;
        for pattern in patterns {
            keys_removed += self.cache.remove_by_pattern(pattern).await;
        }
        InvalidationReport {
            scope,
            keys_removed,
            flushed: false,
        }
    }

    /// Backend statistics, never failing.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

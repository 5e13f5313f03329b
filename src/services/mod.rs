//! Service layer for business logic operations.
//!
//! Services encapsulate business logic and coordinate between
//! repositories and the cache.

pub mod time_record_cache;
mod time_record_service;

pub use time_record_cache::{
    CacheCategory, InvalidationReport, InvalidationScope, TimeRecordCacheService,
};
pub use time_record_service::TimeRecordService;

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::clock::Clock;
use crate::config::TimeRecordSettings;
use crate::error::{AppError, AppResult};
use crate::repositories::Repositories;

/// Aggregates all services for convenient access.
///
/// Cloning is cheap since repositories and the cache backend sit behind `Arc`.
#[derive(Clone)]
pub struct Services {
    pub time_records: TimeRecordService,
    pub cache: TimeRecordCacheService,
}

impl Services {
    /// Wires services over the given repositories and cache.
    ///
    /// Fails only when the configured time zone cannot be resolved.
    pub fn new(
        repos: Repositories,
        cache: CacheManager,
        clock: Arc<dyn Clock>,
        settings: &TimeRecordSettings,
    ) -> AppResult<Self> {
        let time_zone = settings
            .time_zone()
            .map_err(|e| AppError::Configuration {
                key: "time_records.timezone".to_string(),
                source: anyhow::Error::from(e),
            })?;

        let cache = TimeRecordCacheService::new(cache, Arc::clone(&clock), time_zone);
        let time_records = TimeRecordService::new(
            repos.users,
            repos.time_records,
            cache.clone(),
            clock,
            settings.clone(),
        );

        Ok(Self {
            time_records,
            cache,
        })
    }
}

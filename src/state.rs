//! Application state.
//!
//! Contains the shared services and resources a command needs.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::db::{AsyncDbPool, establish_async_connection_pool, run_pending_migrations};
use crate::error::{AppError, AppResult};
use crate::repositories::Repositories;
use crate::services::Services;

/// Application state containing all shared services and resources.
///
/// Cloning is cheap since Services, AsyncDbPool and CacheManager use Arc
/// internally.
#[derive(Clone)]
pub struct AppState {
    /// All business logic services
    pub services: Services,
    /// Direct access to the database connection pool
    pub db_pool: AsyncDbPool,
}

impl AppState {
    /// Connects to the database and the configured cache backend and wires
    /// every service on top of them. Pending migrations run first when
    /// `database.auto_migrate` is set.
    ///
    /// # Example
    /// ```ignore
    /// let settings = ConfigLoader::new()?.load()?;
    /// let state = AppState::build(&settings).await?;
    /// let status = state.services.time_records.can_record_time(7).await?;
    /// ```
    pub async fn build(settings: &Settings) -> AppResult<Self> {
        if settings.database.auto_migrate {
            let applied = run_pending_migrations(&settings.database.url).await?;
            tracing::info!(applied = applied.len(), "Pending migrations applied");
        }

        let pool = establish_async_connection_pool(&settings.database).await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Self::connect_cache(settings, Arc::clone(&clock)).await?;

        Self::new(pool, cache, clock, settings)
    }

    /// Wires services over an existing pool and cache.
    pub fn new(
        pool: AsyncDbPool,
        cache: CacheManager,
        clock: Arc<dyn Clock>,
        settings: &Settings,
    ) -> AppResult<Self> {
        let repos = Repositories::new(pool.clone());
        let services = Services::new(repos, cache, clock, &settings.time_records)?;

        Ok(Self {
            services,
            db_pool: pool,
        })
    }

    /// Opens the configured cache backend without touching the database.
    pub async fn connect_cache(settings: &Settings, clock: Arc<dyn Clock>) -> AppResult<CacheManager> {
        CacheManager::new(&settings.cache, clock)
            .await
            .map_err(|e| AppError::Configuration {
                key: "cache".to_string(),
                source: anyhow::Error::new(e),
            })
    }
}

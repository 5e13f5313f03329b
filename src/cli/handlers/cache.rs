//! Cache command handler
//!
//! Inspects and clears the time record cache without touching the database.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::cache::{CacheBackend, CacheStats};
use crate::clock::{Clock, SystemClock};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::services::{InvalidationReport, InvalidationScope, TimeRecordCacheService};
use crate::state::AppState;

/// What `cache clear` should remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    User(i32),
    Pagination,
    All,
}

impl ClearTarget {
    pub fn from_args(user: Option<i32>, pagination: bool) -> Self {
        match (user, pagination) {
            (Some(id), _) => ClearTarget::User(id),
            (None, true) => ClearTarget::Pagination,
            (None, false) => ClearTarget::All,
        }
    }
}

/// Handler for the cache command
pub struct CacheCommandHandler {
    config: Settings,
}

impl CacheCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Print backend statistics, as text or JSON.
    pub async fn stats(&self, json: bool) -> AppResult<()> {
        let service = self.cache_service().await?;
        let stats = service.cache_stats().await;

        let output = if json {
            serde_json::to_string_pretty(&stats).map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?
        } else {
            render_stats(&stats)
        };
        println!("{}", output);

        Ok(())
    }

    /// Remove cached data. Clearing everything asks for confirmation on
    /// stdin unless `assume_yes` is set.
    pub async fn clear(&self, target: ClearTarget, assume_yes: bool) -> AppResult<()> {
        if target == ClearTarget::All && !assume_yes {
            let confirmed = {
                let stdin = io::stdin();
                confirm(
                    &mut stdin.lock(),
                    &mut io::stdout(),
                    "Remove all cached time record data?",
                )
                .map_err(io_error)?
            };
            if !confirmed {
                println!("Aborted, nothing was removed");
                return Ok(());
            }
        }

        if self.config.cache.enabled && self.config.cache.backend == CacheBackend::Memory {
            tracing::warn!("The memory cache lives inside each process; this command only clears its own");
        }

        let service = self.cache_service().await?;
        let report = clear_cache(&service, target).await;
        println!("{}", render_report(&report));

        Ok(())
    }

    async fn cache_service(&self) -> AppResult<TimeRecordCacheService> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = AppState::connect_cache(&self.config, Arc::clone(&clock)).await?;
        let time_zone = self
            .config
            .time_records
            .time_zone()
            .map_err(|e| AppError::Configuration {
                key: "time_records.timezone".to_string(),
                source: anyhow::Error::from(e),
            })?;

        Ok(TimeRecordCacheService::new(cache, clock, time_zone))
    }

    /// Get the configuration
    pub fn config(&self) -> &Settings {
        &self.config
    }
}

pub(crate) async fn clear_cache(
    service: &TimeRecordCacheService,
    target: ClearTarget,
) -> InvalidationReport {
    match target {
        ClearTarget::User(id) => service.invalidate_user_cache(id).await,
        ClearTarget::Pagination => service.invalidate_pagination_cache().await,
        ClearTarget::All => service.invalidate_all_cache().await,
    }
}

/// Asks a yes/no question; anything but `y` or `yes` is a no.
pub(crate) fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<bool> {
    write!(output, "{} [y/N] ", question)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn render_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Driver:      {}", stats.driver);
    let _ = writeln!(out, "Connected:   {}", if stats.connected { "yes" } else { "no" });
    if let Some(keys) = stats.keys_count {
        let _ = writeln!(out, "Keys:        {}", keys);
    }
    if let Some(used) = &stats.memory_used {
        let _ = writeln!(out, "Memory used: {}", used);
    }
    if let Some(peak) = &stats.memory_peak {
        let _ = writeln!(out, "Memory peak: {}", peak);
    }
    if let Some(message) = &stats.message {
        let _ = writeln!(out, "Note:        {}", message);
    }
    if let Some(error) = &stats.error {
        let _ = writeln!(out, "Error:       {}", error);
    }
    out.trim_end().to_string()
}

pub(crate) fn render_report(report: &InvalidationReport) -> String {
    let scope = match report.scope {
        InvalidationScope::User(id) => format!("cached views of user {}", id),
        InvalidationScope::Pagination => "cached listing pages".to_string(),
        InvalidationScope::All => "all cached time record data".to_string(),
    };

    if report.flushed {
        format!(
            "✓ Cleared {} (backend cannot match keys, flushed {} entries)",
            scope, report.keys_removed
        )
    } else {
        format!("✓ Cleared {} ({} keys removed)", scope, report.keys_removed)
    }
}

fn io_error(e: io::Error) -> AppError {
    AppError::Internal {
        source: anyhow::Error::from(e),
    }
}

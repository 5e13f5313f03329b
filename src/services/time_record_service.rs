//! Punching and record listings.
//!
//! The repositories are the source of truth for every rule enforced here;
//! the cache only shortens reads and early rejections. Every successful
//! punch invalidates the user's cached views before returning.

use std::sync::Arc;

use jiff::civil::Date;
use jiff::{SignedDuration, Timestamp};
use serde_json::json;
use validator::Validate;

use crate::cache::CacheLookup;
use crate::clock::Clock;
use crate::config::TimeRecordSettings;
use crate::error::{AppError, AppResult};
use crate::models::{CanRecordStatus, NewTimeRecord, Page, TimeRecord, TimeRecordEntry, TimeRecordFilters};
use crate::repositories::{RecordQuery, TimeRecordRepository, UserRepository};
use crate::services::time_record_cache::{CacheCategory, TimeRecordCacheService};

const USER_NOT_FOUND: &str = "User not found";
const EMPLOYEES_ONLY: &str = "Only employees can record time";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// `[from, until)` bounds of a local date range.
type DayBounds = (Option<Timestamp>, Option<Timestamp>);

#[derive(Clone)]
pub struct TimeRecordService {
    users: Arc<dyn UserRepository>,
    records: Arc<dyn TimeRecordRepository>,
    cache: TimeRecordCacheService,
    clock: Arc<dyn Clock>,
    settings: TimeRecordSettings,
}

impl TimeRecordService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        records: Arc<dyn TimeRecordRepository>,
        cache: TimeRecordCacheService,
        clock: Arc<dyn Clock>,
        settings: TimeRecordSettings,
    ) -> Self {
        Self {
            users,
            records,
            cache,
            clock,
            settings,
        }
    }

    pub fn cache(&self) -> &TimeRecordCacheService {
        &self.cache
    }

    /// Records a punch for `user_id` at the current instant.
    ///
    /// Only employees may punch, and not within the cooldown of their
    /// previous punch. A punch exactly one cooldown after the previous one
    /// is accepted.
    pub async fn record_time(&self, user_id: i32) -> AppResult<TimeRecord> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::validation("user", USER_NOT_FOUND))?;
        if !user.role.can_record_time() {
            return Err(AppError::validation("user", EMPLOYEES_ONLY));
        }

        let now = self.clock.now();
        if let CacheLookup::Hit(status) = self.cache.get_can_record(user_id).await {
            if let Some(at) = status.next_allowed_at.filter(|at| !status.can_record && *at > now) {
                tracing::debug!(user_id, next_allowed_at = %at, "Punch rejected from cached status");
                return Err(self.cooldown_error(at));
            }
        }

        if let Some(at) = self.cooldown_until(user_id, now).await? {
            return Err(self.cooldown_error(at));
        }

        let record = self
            .records
            .create(NewTimeRecord {
                user_id,
                recorded_at: now,
            })
            .await?;

        self.cache.invalidate_user_cache(user_id).await;

        tracing::info!(user_id, record_id = record.id, recorded_at = %record.recorded_at, "Time recorded");
        Ok(record)
    }

    /// Whether `user_id` may punch now.
    ///
    /// Unknown users and non-employees get a negative status, not an error.
    pub async fn can_record_time(&self, user_id: i32) -> AppResult<CanRecordStatus> {
        let now = self.clock.now();
        match self.cache.get_can_record(user_id).await {
            CacheLookup::Hit(status) if !status.is_expired(now) => return Ok(status),
            CacheLookup::Hit(_) => {
                tracing::debug!(user_id, "Cached punch status outlived its cooldown");
            }
            CacheLookup::Miss | CacheLookup::Unavailable => {}
        }

        let status = self.compute_can_record(user_id, now).await?;
        self.cache.cache_can_record(user_id, &status).await;
        Ok(status)
    }

    async fn compute_can_record(&self, user_id: i32, now: Timestamp) -> AppResult<CanRecordStatus> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(CanRecordStatus::denied(USER_NOT_FOUND));
        };
        if !user.role.can_record_time() {
            return Ok(CanRecordStatus::denied(EMPLOYEES_ONLY));
        }

        Ok(match self.cooldown_until(user_id, now).await? {
            Some(at) => CanRecordStatus::cooling_down(at, self.cooldown_message()),
            None => CanRecordStatus::allowed(),
        })
    }

    /// End of the cooldown started by the user's latest punch, if it is
    /// still running at `now`.
    async fn cooldown_until(&self, user_id: i32, now: Timestamp) -> AppResult<Option<Timestamp>> {
        let Some(latest) = self.records.find_latest_by_user(user_id).await? else {
            return Ok(None);
        };
        let next = latest
            .recorded_at
            .checked_add(self.cooldown())
            .unwrap_or(Timestamp::MAX);
        Ok((next > now).then_some(next))
    }

    fn cooldown(&self) -> SignedDuration {
        SignedDuration::from_secs(i64::try_from(self.settings.cooldown_seconds).unwrap_or(i64::MAX))
    }

    fn cooldown_message(&self) -> String {
        match self.settings.cooldown_seconds {
            60 => "You already recorded time recently. Wait 1 minute.".to_string(),
            secs if secs % 60 == 0 => format!(
                "You already recorded time recently. Wait {} minutes.",
                secs / 60
            ),
            secs => format!("You already recorded time recently. Wait {} seconds.", secs),
        }
    }

    fn cooldown_error(&self, next_allowed_at: Timestamp) -> AppError {
        AppError::CooldownActive {
            next_allowed_at,
            reason: self.cooldown_message(),
        }
    }

    /// One page of records matching `filters`, newest first.
    ///
    /// A `per_page` of 0 selects the configured default; larger values are
    /// capped at the configured maximum.
    pub async fn get_paginated_records(
        &self,
        filters: TimeRecordFilters,
        per_page: u32,
    ) -> AppResult<Page<TimeRecordEntry>> {
        let filters = filters.normalized();
        filters.validate()?;

        let start = filters.start_date.as_deref().map(parse_date).transpose()?;
        let end = filters.end_date.as_deref().map(parse_date).transpose()?;
        let (from, until) = self.day_bounds(start, end)?;

        let per_page = self.page_size(per_page);
        let page = filters.page;
        let key = self.cache.pagination_key(&filters, per_page, page);

        let query = RecordQuery {
            user_id: filters.user_id,
            manager_id: filters.manager_id,
            from,
            until,
            search: filters.search,
        };
        let offset = i64::from(page - 1) * i64::from(per_page);
        let records = Arc::clone(&self.records);

        self.cache
            .remember(key.as_deref(), CacheCategory::Pagination, move || async move {
                let (data, total) = records.query(&query, offset, i64::from(per_page)).await?;
                Ok(Page::new(
                    data,
                    u64::try_from(total).unwrap_or_default(),
                    page,
                    per_page,
                ))
            })
            .await
    }

    /// Every record between two local dates, both inclusive, optionally for
    /// one user.
    pub async fn get_records_by_date_range(
        &self,
        start_date: &str,
        end_date: &str,
        user_id: Option<i32>,
    ) -> AppResult<Vec<TimeRecordEntry>> {
        let start = parse_date(start_date.trim())?;
        let end = parse_date(end_date.trim())?;
        let (from, until) = match self.day_bounds(Some(start), Some(end))? {
            (Some(from), Some(until)) => (from, until),
            _ => return Err(AppError::validation("dates", "Both dates are required")),
        };

        let key = self.cache.report_key(&json!({
            "type": "date_range",
            "start_date": start.to_string(),
            "end_date": end.to_string(),
            "user_id": user_id,
        }));
        let records = Arc::clone(&self.records);

        self.cache
            .remember(key.as_deref(), CacheCategory::Report, move || async move {
                records.find_between(user_id, from, until).await
            })
            .await
    }

    pub async fn get_today_records_by_user(&self, user_id: i32) -> AppResult<Vec<TimeRecordEntry>> {
        self.today_records(Some(user_id)).await
    }

    pub async fn get_all_today_records(&self) -> AppResult<Vec<TimeRecordEntry>> {
        self.today_records(None).await
    }

    async fn today_records(&self, user_id: Option<i32>) -> AppResult<Vec<TimeRecordEntry>> {
        let today = self.cache.today();
        let (from, until) = match self.day_bounds(Some(today), Some(today))? {
            (Some(from), Some(until)) => (from, until),
            _ => return Ok(Vec::new()),
        };

        let key = self.cache.today_key(user_id);
        let records = Arc::clone(&self.records);

        self.cache
            .remember(Some(&key), CacheCategory::TodayRecords, move || async move {
                records.find_between(user_id, from, until).await
            })
            .await
    }

    /// The user's most recent punch, read straight from the repository.
    pub async fn get_latest_record_by_user(&self, user_id: i32) -> AppResult<Option<TimeRecord>> {
        self.records.find_latest_by_user(user_id).await
    }

    fn page_size(&self, requested: u32) -> u32 {
        let max = self.settings.max_per_page.max(1);
        match requested {
            0 => self.settings.default_per_page.clamp(1, max),
            n => n.min(max),
        }
    }

    /// Start of `start` and start of the day after `end`, in the configured
    /// zone. Either side may be open.
    fn day_bounds(&self, start: Option<Date>, end: Option<Date>) -> AppResult<DayBounds> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::validation(
                    "dates",
                    "start_date must be on or before end_date",
                ));
            }
        }

        let tz = self.cache.time_zone();
        let day_start = |date: Date| -> AppResult<Timestamp> {
            date.to_zoned(tz.clone())
                .map(|zoned| zoned.timestamp())
                .map_err(|e| AppError::validation("dates", e.to_string()))
        };

        let from = start.map(day_start).transpose()?;
        let until = end
            .map(|date| {
                date.tomorrow()
                    .map_err(|e| AppError::validation("dates", e.to_string()))
                    .and_then(day_start)
            })
            .transpose()?;

        Ok((from, until))
    }
}

fn parse_date(value: &str) -> AppResult<Date> {
    Date::strptime(DATE_FORMAT, value).map_err(|_| {
        AppError::validation("dates", format!("'{}' is not a valid YYYY-MM-DD date", value))
    })
}

//! Repository layer for data access operations.
//!
//! Services talk to storage through the [`UserRepository`] and
//! [`TimeRecordRepository`] traits so tests can swap PostgreSQL for an
//! in-memory store.

mod time_record_repo;
mod user_repo;

#[cfg(test)]
pub(crate) mod in_memory;

pub use time_record_repo::PgTimeRecordRepository;
pub use user_repo::PgUserRepository;

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::db::AsyncDbPool;
use crate::error::AppResult;
use crate::models::{NewTimeRecord, TimeRecord, TimeRecordEntry, User};

/// Record selection shared by listings and reports.
///
/// `from` is inclusive and `until` exclusive. `search` matches employee name
/// or position, case-insensitively, anywhere in the text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub user_id: Option<i32>,
    pub manager_id: Option<i32>,
    pub from: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub search: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>>;
}

/// Time record storage. Every listing is ordered newest first, ties broken
/// by ascending id.
#[async_trait]
pub trait TimeRecordRepository: Send + Sync {
    async fn find_latest_by_user(&self, user_id: i32) -> AppResult<Option<TimeRecord>>;

    async fn create(&self, record: NewTimeRecord) -> AppResult<TimeRecord>;

    /// One page of matching records and the total number of matches.
    async fn query(
        &self,
        query: &RecordQuery,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<TimeRecordEntry>, i64)>;

    /// Every record in `[from, until)`, optionally for a single user.
    async fn find_between(
        &self,
        user_id: Option<i32>,
        from: Timestamp,
        until: Timestamp,
    ) -> AppResult<Vec<TimeRecordEntry>>;
}

/// Aggregates all repositories for convenient access.
///
/// Cloning is cheap; clones share the underlying stores.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub time_records: Arc<dyn TimeRecordRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            time_records: Arc::new(PgTimeRecordRepository::new(pool)),
        }
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside LIKE.
pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

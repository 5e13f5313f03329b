//! Time record repository for async database operations.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::PgTextExpressionMethods;
use diesel::dsl::{InnerJoin, IntoBoxed};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use jiff::Timestamp;
use jiff_diesel::ToDiesel;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::models::{NewTimeRecord, NewTimeRecordRow, TimeRecord, TimeRecordEntry, TimeRecordRow};
use crate::repositories::{RecordQuery, TimeRecordRepository, escape_like};
use crate::schema::{time_records, users};

type RecordSource = InnerJoin<time_records::table, users::table>;
type BoxedRecordQuery<'a> = IntoBoxed<'a, RecordSource, Pg>;

/// Columns loaded for a listing row, before manager names are attached.
type EntryColumns = (TimeRecordRow, (String, Option<String>, Option<i32>));

#[derive(Clone)]
pub struct PgTimeRecordRepository {
    pool: AsyncDbPool,
}

impl PgTimeRecordRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    fn filtered(query: &RecordQuery) -> BoxedRecordQuery<'static> {
        let mut q = time_records::table.inner_join(users::table).into_boxed();

        if let Some(user_id) = query.user_id {
            q = q.filter(time_records::user_id.eq(user_id));
        }
        if let Some(manager_id) = query.manager_id {
            q = q.filter(users::manager_id.eq(manager_id));
        }
        if let Some(from) = query.from {
            q = q.filter(time_records::recorded_at.ge(from.to_diesel()));
        }
        if let Some(until) = query.until {
            q = q.filter(time_records::recorded_at.lt(until.to_diesel()));
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", escape_like(search));
            q = q.filter(
                users::name
                    .ilike(pattern.clone())
                    .or(users::position.ilike(pattern)),
            );
        }

        q
    }

    async fn load_entries(
        conn: &mut AsyncPgConnection,
        query: BoxedRecordQuery<'static>,
    ) -> AppResult<Vec<TimeRecordEntry>> {
        let rows: Vec<EntryColumns> = query
            .order((time_records::recorded_at.desc(), time_records::id.asc()))
            .select((
                TimeRecordRow::as_select(),
                (users::name, users::position, users::manager_id),
            ))
            .load(conn)
            .await?;

        let manager_ids: Vec<i32> = rows
            .iter()
            .filter_map(|(_, (_, _, manager_id))| *manager_id)
            .collect();
        let managers = Self::manager_names(conn, manager_ids).await?;

        Ok(rows
            .into_iter()
            .map(|(record, (employee_name, position, manager_id))| {
                let record = TimeRecord::from(record);
                TimeRecordEntry {
                    id: record.id,
                    user_id: record.user_id,
                    recorded_at: record.recorded_at,
                    employee_name,
                    position,
                    manager_id,
                    manager_name: manager_id.and_then(|id| managers.get(&id).cloned()),
                }
            })
            .collect())
    }

    async fn manager_names(
        conn: &mut AsyncPgConnection,
        mut ids: Vec<i32>,
    ) -> AppResult<HashMap<i32, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        ids.sort_unstable();
        ids.dedup();

        let names: Vec<(i32, String)> = users::table
            .filter(users::id.eq_any(ids))
            .select((users::id, users::name))
            .load(conn)
            .await?;

        Ok(names.into_iter().collect())
    }
}

#[async_trait]
impl TimeRecordRepository for PgTimeRecordRepository {
    async fn find_latest_by_user(&self, user_id: i32) -> AppResult<Option<TimeRecord>> {
        let mut conn = self.pool.get().await?;

        let row = time_records::table
            .filter(time_records::user_id.eq(user_id))
            .order((time_records::recorded_at.desc(), time_records::id.desc()))
            .select(TimeRecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(TimeRecord::from))
    }

    async fn create(&self, record: NewTimeRecord) -> AppResult<TimeRecord> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(time_records::table)
            .values(NewTimeRecordRow::from(record))
            .returning(TimeRecordRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(TimeRecord::from)
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "insert time record"))
    }

    async fn query(
        &self,
        query: &RecordQuery,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<TimeRecordEntry>, i64)> {
        let mut conn = self.pool.get().await?;

        let total = Self::filtered(query)
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(AppError::from)?;

        if total == 0 || offset >= total {
            return Ok((Vec::new(), total));
        }

        let page = Self::filtered(query).offset(offset).limit(limit);
        let entries = Self::load_entries(&mut conn, page).await?;

        Ok((entries, total))
    }

    async fn find_between(
        &self,
        user_id: Option<i32>,
        from: Timestamp,
        until: Timestamp,
    ) -> AppResult<Vec<TimeRecordEntry>> {
        let mut conn = self.pool.get().await?;

        let query = RecordQuery {
            user_id,
            from: Some(from),
            until: Some(until),
            ..RecordQuery::default()
        };
        Self::load_entries(&mut conn, Self::filtered(&query)).await
    }
}

use diesel::prelude::*;
use jiff::Timestamp;
use jiff_diesel::ToDiesel;
use serde::{Deserialize, Serialize};

/// One punch of the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub id: i64,
    pub user_id: i32,
    pub recorded_at: Timestamp,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::time_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TimeRecordRow {
    pub id: i64,
    pub user_id: i32,
    pub recorded_at: jiff_diesel::Timestamp,
}

impl From<TimeRecordRow> for TimeRecord {
    fn from(row: TimeRecordRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            recorded_at: row.recorded_at.to_jiff(),
        }
    }
}

/// A record about to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTimeRecord {
    pub user_id: i32,
    pub recorded_at: Timestamp,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::time_records)]
pub struct NewTimeRecordRow {
    pub user_id: i32,
    pub recorded_at: jiff_diesel::Timestamp,
}

impl From<NewTimeRecord> for NewTimeRecordRow {
    fn from(record: NewTimeRecord) -> Self {
        Self {
            user_id: record.user_id,
            recorded_at: record.recorded_at.to_diesel(),
        }
    }
}

/// A record joined with the data listings show next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecordEntry {
    pub id: i64,
    pub user_id: i32,
    pub recorded_at: Timestamp,
    pub employee_name: String,
    pub position: Option<String>,
    pub manager_id: Option<i32>,
    pub manager_name: Option<String>,
}

/// Whether a user may punch right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanRecordStatus {
    pub can_record: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_allowed_at: Option<Timestamp>,
}

impl CanRecordStatus {
    pub fn allowed() -> Self {
        Self {
            can_record: true,
            message: "You can record time".to_string(),
            next_allowed_at: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            can_record: false,
            message: message.into(),
            next_allowed_at: None,
        }
    }

    pub fn cooling_down(next_allowed_at: Timestamp, message: impl Into<String>) -> Self {
        Self {
            can_record: false,
            message: message.into(),
            next_allowed_at: Some(next_allowed_at),
        }
    }

    /// A denial that only held until an instant now in the past.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        !self.can_record && self.next_allowed_at.is_some_and(|at| at <= now)
    }
}

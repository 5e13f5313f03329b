//! In-memory repositories for service tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{AppError, AppResult};
use crate::models::{NewTimeRecord, Role, TimeRecord, TimeRecordEntry, User};
use crate::repositories::{RecordQuery, TimeRecordRepository, UserRepository};

#[derive(Default)]
pub struct InMemoryRepository {
    users: Mutex<Vec<User>>,
    records: Mutex<Vec<TimeRecord>>,
    /// Number of `query` calls, to tell cache hits from repository reads.
    query_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: i32, name: &str, role: Role, manager_id: Option<i32>) -> User {
        let user = User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            position: Some(match role {
                Role::Admin => "Administrator".to_string(),
                Role::Manager => "Team Lead".to_string(),
                Role::Employee => "Analyst".to_string(),
            }),
            role,
            manager_id,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    /// Inserts a record directly, bypassing the service rules.
    pub fn add_record(&self, user_id: i32, recorded_at: Timestamp) -> TimeRecord {
        let mut records = self.records.lock().unwrap();
        let record = TimeRecord {
            id: records.len() as i64 + 1,
            user_id,
            recorded_at,
        };
        records.push(record.clone());
        record
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn entries(&self, query: &RecordQuery) -> Vec<TimeRecordEntry> {
        let users = self.users.lock().unwrap();
        let records = self.records.lock().unwrap();
        let find_user = |id: i32| users.iter().find(|u| u.id == id);
        let search = query.search.as_ref().map(|s| s.to_lowercase());

        let mut entries: Vec<TimeRecordEntry> = records
            .iter()
            .filter_map(|record| {
                let user = find_user(record.user_id)?;
                let matches = query.user_id.is_none_or(|id| record.user_id == id)
                    && query.manager_id.is_none_or(|id| user.manager_id == Some(id))
                    && query.from.is_none_or(|from| record.recorded_at >= from)
                    && query.until.is_none_or(|until| record.recorded_at < until)
                    && search.as_ref().is_none_or(|needle| {
                        user.name.to_lowercase().contains(needle.as_str())
                            || user
                                .position
                                .as_ref()
                                .is_some_and(|p| p.to_lowercase().contains(needle.as_str()))
                    });

                matches.then(|| TimeRecordEntry {
                    id: record.id,
                    user_id: record.user_id,
                    recorded_at: record.recorded_at,
                    employee_name: user.name.clone(),
                    position: user.position.clone(),
                    manager_id: user.manager_id,
                    manager_name: user
                        .manager_id
                        .and_then(find_user)
                        .map(|m| m.name.clone()),
                })
            })
            .collect();

        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(a.id.cmp(&b.id)));
        entries
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl TimeRecordRepository for InMemoryRepository {
    async fn find_latest_by_user(&self, user_id: i32) -> AppResult<Option<TimeRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn create(&self, record: NewTimeRecord) -> AppResult<TimeRecord> {
        let known = self
            .users
            .lock()
            .unwrap()
            .iter()
            .any(|u| u.id == record.user_id);
        if !known {
            return Err(AppError::validation("user_id", "Invalid reference in user_id"));
        }
        Ok(self.add_record(record.user_id, record.recorded_at))
    }

    async fn query(
        &self,
        query: &RecordQuery,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<TimeRecordEntry>, i64)> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries(query);
        let total = entries.len() as i64;
        let page = entries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_between(
        &self,
        user_id: Option<i32>,
        from: Timestamp,
        until: Timestamp,
    ) -> AppResult<Vec<TimeRecordEntry>> {
        Ok(self.entries(&RecordQuery {
            user_id,
            from: Some(from),
            until: Some(until),
            ..RecordQuery::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let repo = InMemoryRepository::new();
        repo.add_user(1, "Maria Boss", Role::Manager, None);
        repo.add_user(2, "Ana Souza", Role::Employee, Some(1));
        repo.add_user(3, "Bruno Lima", Role::Employee, None);
        repo.add_record(2, ts("2024-05-10T08:00:00Z"));
        repo.add_record(3, ts("2024-05-10T09:00:00Z"));
        repo.add_record(2, ts("2024-05-10T09:00:00Z"));

        let (all, total) = repo.query(&RecordQuery::default(), 0, 10).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<i64> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let by_manager = RecordQuery {
            manager_id: Some(1),
            ..Default::default()
        };
        let (entries, total) = repo.query(&by_manager, 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert!(entries.iter().all(|e| e.manager_name.as_deref() == Some("Maria Boss")));

        let search = RecordQuery {
            search: Some("BRUNO".to_string()),
            ..Default::default()
        };
        let (entries, _) = repo.query(&search, 0, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].employee_name, "Bruno Lima");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_user() {
        let repo = InMemoryRepository::new();
        let result = repo
            .create(NewTimeRecord {
                user_id: 99,
                recorded_at: Timestamp::UNIX_EPOCH,
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation { field, .. }) if field == "user_id"));
    }
}

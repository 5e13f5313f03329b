//! Records command handler
//!
//! Punches and record queries against the configured database, printed as
//! JSON.

use serde::Serialize;

use crate::cli::parser::RecordCommands;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::models::TimeRecordFilters;
use crate::services::TimeRecordService;
use crate::state::AppState;

/// A parsed `records` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    Punch(i32),
    Status(i32),
    List {
        filters: TimeRecordFilters,
        per_page: u32,
    },
    Report {
        from: String,
        to: String,
        user_id: Option<i32>,
    },
    Today(Option<i32>),
}

impl From<&RecordCommands> for RecordAction {
    fn from(command: &RecordCommands) -> Self {
        match command {
            RecordCommands::Punch { user_id } => RecordAction::Punch(*user_id),
            RecordCommands::Status { user_id } => RecordAction::Status(*user_id),
            RecordCommands::List {
                user,
                manager,
                from,
                to,
                search,
                page,
                per_page,
            } => RecordAction::List {
                filters: TimeRecordFilters {
                    user_id: *user,
                    manager_id: *manager,
                    start_date: from.clone(),
                    end_date: to.clone(),
                    search: search.clone(),
                    page: *page,
                },
                per_page: *per_page,
            },
            RecordCommands::Report { from, to, user } => RecordAction::Report {
                from: from.clone(),
                to: to.clone(),
                user_id: *user,
            },
            RecordCommands::Today { user } => RecordAction::Today(*user),
        }
    }
}

/// Handler for the records command
pub struct RecordsCommandHandler {
    config: Settings,
}

impl RecordsCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, action: RecordAction) -> AppResult<()> {
        let state = AppState::build(&self.config).await?;
        let output = run_action(&state.services.time_records, action).await?;
        println!("{}", output);
        Ok(())
    }
}

pub(crate) async fn run_action(service: &TimeRecordService, action: RecordAction) -> AppResult<String> {
    match action {
        RecordAction::Punch(user_id) => to_json(&service.record_time(user_id).await?),
        RecordAction::Status(user_id) => to_json(&service.can_record_time(user_id).await?),
        RecordAction::List { filters, per_page } => {
            to_json(&service.get_paginated_records(filters, per_page).await?)
        }
        RecordAction::Report { from, to, user_id } => {
            to_json(&service.get_records_by_date_range(&from, &to, user_id).await?)
        }
        RecordAction::Today(Some(user_id)) => {
            to_json(&service.get_today_records_by_user(user_id).await?)
        }
        RecordAction::Today(None) => to_json(&service.get_all_today_records().await?),
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })
}

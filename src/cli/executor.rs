//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use clap::CommandFactory;

use super::handlers::{
    CacheCommandHandler, ClearTarget, MigrateAction, MigrateCommandHandler, RecordAction,
    RecordsCommandHandler,
};
use super::parser::{CacheCommands, Cli, Commands};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    validate_command_args(cli)?;

    match &cli.command {
        Some(Commands::Cache { action }) => {
            let handler = CacheCommandHandler::new(settings);
            match action {
                CacheCommands::Stats { json } => handler.stats(*json).await,
                CacheCommands::Clear {
                    user,
                    pagination,
                    yes,
                } => {
                    handler
                        .clear(ClearTarget::from_args(*user, *pagination), *yes)
                        .await
                }
            }
        }
        Some(Commands::Records { action }) => {
            RecordsCommandHandler::new(settings)
                .execute(RecordAction::from(action))
                .await
        }
        Some(Commands::Migrate { dry_run, rollback }) => {
            MigrateCommandHandler::new(settings)
                .execute(MigrateAction::from_args(*dry_run, *rollback))
                .await
        }
        None => Cli::command().print_help().map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        }),
    }
}

/// Validate command arguments before execution
fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate()
        .map_err(|msg| AppError::validation("cli_arguments", msg))?;

    if let Some(Commands::Migrate {
        rollback: Some(steps),
        ..
    }) = cli.command
        && steps > 50
    {
        tracing::warn!(
            steps,
            "Rolling back this many migrations is a large operation; consider smaller steps"
        );
    }

    Ok(())
}

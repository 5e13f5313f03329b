//! Migrate command handler
//!
//! Applies, previews and reverts the embedded schema migrations.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::MigrationHarness;

use crate::config::settings::Settings;
use crate::db::{MIGRATIONS, run_pending_migrations};
use crate::error::{AppError, AppResult};

/// What `migrate` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateAction {
    Run,
    DryRun,
    Rollback(u32),
}

impl MigrateAction {
    pub fn from_args(dry_run: bool, rollback: Option<u32>) -> Self {
        match (dry_run, rollback) {
            (true, _) => MigrateAction::DryRun,
            (false, Some(steps)) => MigrateAction::Rollback(steps),
            (false, None) => MigrateAction::Run,
        }
    }
}

/// Handler for the migrate command
pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// # Errors
    /// - Database connection errors
    /// - Migration execution errors
    /// - Configuration validation errors
    pub async fn execute(&self, action: MigrateAction) -> AppResult<()> {
        self.config.database.validate()?;

        match action {
            MigrateAction::DryRun => self.show_pending_migrations().await,
            MigrateAction::Run => self.run_migrations().await,
            MigrateAction::Rollback(steps) => self.rollback_migrations(steps).await,
        }
    }

    async fn show_pending_migrations(&self) -> AppResult<()> {
        println!("Checking for pending migrations...");

        let pending = self
            .with_connection("check pending migrations", |conn| {
                let pending = conn.pending_migrations(MIGRATIONS).map_err(migration_error)?;
                Ok(pending.iter().map(|m| m.name().to_string()).collect::<Vec<_>>())
            })
            .await?;

        if pending.is_empty() {
            println!("✓ No pending migrations found - database is up to date");
        } else {
            println!("Found {} pending migration(s):", pending.len());
            for name in &pending {
                println!("  - {}", name);
            }
            println!("\nRun without --dry-run to apply these migrations");
        }

        Ok(())
    }

    async fn run_migrations(&self) -> AppResult<()> {
        println!("Running database migrations...");

        let applied = run_pending_migrations(&self.config.database.url).await?;

        if applied.is_empty() {
            println!("✓ No migrations to apply - database is already up to date");
        } else {
            println!("✓ Applied {} migration(s):", applied.len());
            for migration in &applied {
                println!("  - {}", migration);
            }
        }
        tracing::info!(applied = applied.len(), "Database migrations complete");

        Ok(())
    }

    async fn rollback_migrations(&self, steps: u32) -> AppResult<()> {
        if steps == 0 {
            return Err(AppError::validation(
                "rollback_steps",
                "Number of rollback steps must be greater than 0",
            ));
        }

        println!("Rolling back {} migration(s)...", steps);

        let reverted = self
            .with_connection("revert migrations", move |conn| {
                let applied = conn.applied_migrations().map_err(migration_error)?;
                if applied.len() < steps as usize {
                    return Err(AppError::validation(
                        "rollback_steps",
                        format!(
                            "Cannot rollback {} migrations - only {} applied migrations available",
                            steps,
                            applied.len()
                        ),
                    ));
                }

                let mut reverted = Vec::with_capacity(steps as usize);
                for _ in 0..steps {
                    let version = conn.revert_last_migration(MIGRATIONS).map_err(migration_error)?;
                    reverted.push(version.to_string());
                }
                Ok(reverted)
            })
            .await?;

        println!("✓ Rolled back {} migration(s):", reverted.len());
        for version in &reverted {
            println!("  - {}", version);
        }
        tracing::info!(reverted = reverted.len(), "Database migrations reverted");

        Ok(())
    }

    /// Runs `work` on a dedicated synchronous connection off the async runtime.
    async fn with_connection<T, F>(&self, operation: &'static str, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let database_url = self.config.database.url.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn =
                PgConnection::establish(&database_url).map_err(|e| AppError::Database {
                    operation: operation.to_string(),
                    source: anyhow::anyhow!("Connection error: {}", e),
                })?;
            work(&mut conn)
        })
        .await
        .map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?
    }

    /// Get the configuration
    pub fn config(&self) -> &Settings {
        &self.config
    }
}

fn migration_error(e: Box<dyn std::error::Error + Send + Sync>) -> AppError {
    AppError::Database {
        operation: "migration".to_string(),
        source: anyhow::anyhow!("Migration error: {}", e),
    }
}

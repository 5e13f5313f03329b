//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Operator tool for the timeclock time-record service
#[derive(Parser, Debug)]
#[command(name = "timeclock-rs")]
#[command(about = "Operator tool for the timeclock time-record service")]
#[command(long_about = "
timeclock-rs is the operator tool of the employee time clock: it records and
lists punches, applies database migrations, and inspects or clears the time
record cache.

EXAMPLES:
    # Record a punch for employee 42
    timeclock-rs records punch 42

    # List May's records for the reports of manager 3
    timeclock-rs records list --manager 3 --from 2024-05-01 --to 2024-05-31

    # Show cache backend statistics
    timeclock-rs cache stats

    # Drop the cached views of one employee after a manual data fix
    timeclock-rs cache clear --user 42

    # Drop every cached listing page
    timeclock-rs cache clear --pagination

    # Drop all cached time record data without a confirmation prompt
    timeclock-rs cache clear --yes

    # Use a custom configuration file
    timeclock-rs --config /path/to/config.toml cache stats

    # Run database migrations
    timeclock-rs migrate

    # Preview pending migrations
    timeclock-rs migrate --dry-run

    # Rollback last 2 migrations
    timeclock-rs migrate --rollback 2

For more information about configuration options, see the documentation.
")]
#[command(version = crate::build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered configuration
    /// directory. The file must exist and be readable.
    ///
    /// Example: --config /etc/timeclock/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` is layered over the defaults.
    ///
    /// Available values: development (dev), staging (stage), production (prod), test
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Increases log output to debug level. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Reduces log output to error level only. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level override
    ///
    /// Takes precedence over the configuration file and --verbose/--quiet.
    ///
    /// Available levels: error, warn, info, debug, trace
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or clear the time record cache
    ///
    /// Examples:
    ///   timeclock-rs cache stats               # Backend statistics
    ///   timeclock-rs cache clear --user 42     # One employee's cached views
    ///   timeclock-rs cache clear --yes         # Everything, no prompt
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
    /// Record punches and query time records
    ///
    /// Examples:
    ///   timeclock-rs records punch 42             # Punch for employee 42
    ///   timeclock-rs records status 42            # May employee 42 punch now?
    ///   timeclock-rs records list --from 2024-05-01 --to 2024-05-31
    ///   timeclock-rs records today --user 42
    Records {
        #[command(subcommand)]
        action: RecordCommands,
    },
    /// Database migration operations
    ///
    /// Examples:
    ///   timeclock-rs migrate                    # Apply all pending migrations
    ///   timeclock-rs migrate --dry-run          # Show pending migrations without applying
    ///   timeclock-rs migrate --rollback 3       # Rollback the last 3 migrations
    Migrate {
        /// Show pending migrations without applying
        ///
        /// Cannot be used with --rollback.
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to rollback
        ///
        /// Reverts the specified number of most recent migrations.
        /// Must be between 1 and 100. Cannot be used with --dry-run.
        ///
        /// Example: --rollback 2 (reverts last 2 migrations)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show backend statistics
    Stats {
        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove cached time record data
    ///
    /// Without options every key under the time record prefix is removed,
    /// after a confirmation prompt.
    Clear {
        /// Only the views a new record by this user would make stale
        #[arg(long, value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        user: Option<i32>,

        /// Only cached listing pages
        #[arg(long, conflicts_with = "user")]
        pagination: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Time record subcommands
#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// Record a punch for an employee at the current time
    Punch {
        #[arg(value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        user_id: i32,
    },
    /// Show whether an employee may punch now
    Status {
        #[arg(value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        user_id: i32,
    },
    /// List records, newest first
    List {
        /// Only this employee's records
        #[arg(long, value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        user: Option<i32>,

        /// Only records of this manager's direct reports
        #[arg(long, value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        manager: Option<i32>,

        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<String>,

        /// Match on employee name or position
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size; 0 uses the configured default
        #[arg(long, default_value_t = 0)]
        per_page: u32,
    },
    /// Every record between two days, both inclusive
    Report {
        #[arg(long, value_name = "DATE")]
        from: String,

        #[arg(long, value_name = "DATE")]
        to: String,

        #[arg(long, value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        user: Option<i32>,
    },
    /// Today's records, for one employee or everyone
    Today {
        #[arg(long, value_name = "USER_ID", value_parser = super::validation::validate_user_id)]
        user: Option<i32>,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

/// Log level options
#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        match &self.command {
            Some(Commands::Migrate { dry_run, rollback }) if *dry_run && rollback.is_some() => {
                Err("Cannot use --dry-run and --rollback together".to_string())
            }
            Some(Commands::Cache {
                action:
                    CacheCommands::Clear {
                        user: Some(_),
                        pagination: true,
                        ..
                    },
            }) => Err("Cannot use --user and --pagination together".to_string()),
            _ => Ok(()),
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_flag() {
        let result = Cli::try_parse_from(["timeclock-rs", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["timeclock-rs", "--version"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_default_behavior() {
        let cli = Cli::try_parse_from(["timeclock-rs"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.env.is_none());
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_cache_stats_command() {
        let cli = Cli::try_parse_from(["timeclock-rs", "cache", "stats", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                action: CacheCommands::Stats { json: true }
            })
        ));
    }

    #[test]
    fn test_cache_clear_for_user() {
        let cli = Cli::try_parse_from(["timeclock-rs", "cache", "clear", "--user", "42"]).unwrap();
        match cli.command {
            Some(Commands::Cache {
                action:
                    CacheCommands::Clear {
                        user,
                        pagination,
                        yes,
                    },
            }) => {
                assert_eq!(user, Some(42));
                assert!(!pagination);
                assert!(!yes);
            }
            other => panic!("Expected cache clear, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_clear_rejects_bad_user_id() {
        for id in ["0", "-3", "abc"] {
            let result = Cli::try_parse_from(["timeclock-rs", "cache", "clear", "--user", id]);
            assert!(result.is_err(), "user id {} should be rejected", id);
        }
    }

    #[test]
    fn test_cache_clear_user_conflicts_with_pagination() {
        let result = Cli::try_parse_from([
            "timeclock-rs",
            "cache",
            "clear",
            "--user",
            "4",
            "--pagination",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_records_list_command() {
        let cli = Cli::try_parse_from([
            "timeclock-rs",
            "records",
            "list",
            "--from",
            "2024-05-01",
            "--manager",
            "3",
            "--page",
            "2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Records {
                action:
                    RecordCommands::List {
                        user,
                        manager,
                        from,
                        to,
                        page,
                        per_page,
                        ..
                    },
            }) => {
                assert_eq!(user, None);
                assert_eq!(manager, Some(3));
                assert_eq!(from.as_deref(), Some("2024-05-01"));
                assert_eq!(to, None);
                assert_eq!(page, 2);
                assert_eq!(per_page, 0);
            }
            other => panic!("Expected records list, got {:?}", other),
        }
    }

    #[test]
    fn test_records_punch_requires_user() {
        assert!(Cli::try_parse_from(["timeclock-rs", "records", "punch"]).is_err());
        let cli = Cli::try_parse_from(["timeclock-rs", "records", "punch", "42"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Records {
                action: RecordCommands::Punch { user_id: 42 }
            })
        ));
    }

    #[test]
    fn test_migrate_command() {
        let cli = Cli::try_parse_from(["timeclock-rs", "migrate", "--dry-run"]).unwrap();
        if let Some(Commands::Migrate { dry_run, rollback }) = cli.command {
            assert!(dry_run);
            assert!(rollback.is_none());
        } else {
            panic!("Expected Migrate command");
        }
    }

    #[test]
    fn test_global_log_level_after_subcommand() {
        let cli =
            Cli::try_parse_from(["timeclock-rs", "cache", "stats", "--log-level", "warn"]).unwrap();
        assert!(matches!(cli.log_level, Some(LogLevel::Warn)));
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let result = Cli::try_parse_from(["timeclock-rs", "--verbose", "--quiet"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_env_alias() {
        let cli = Cli::try_parse_from(["timeclock-rs", "--env", "prod"]).unwrap();
        let env: crate::config::Environment = cli.env.unwrap().into();
        assert_eq!(env, crate::config::Environment::Production);
    }
}

//! Command handlers for CLI operations
//!
//! This module contains handlers for different CLI commands,
//! separating command execution logic from parsing and validation.

pub mod cache;
pub mod migrate;
pub mod records;

pub use cache::{CacheCommandHandler, ClearTarget};
pub use migrate::{MigrateAction, MigrateCommandHandler};
pub use records::{RecordAction, RecordsCommandHandler};

//! Database connection pool module.
//!
//! Provides async PostgreSQL connection pooling using diesel_async with bb8,
//! plus the embedded schema migrations.

mod migrations;
mod pool;

pub use migrations::{MIGRATIONS, run_pending_migrations};
pub use pool::{AsyncDbPool, establish_async_connection_pool};

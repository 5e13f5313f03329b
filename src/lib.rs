//! timeclock-rs library
//!
//! Employee time clock core: punch recording with a per-user cooldown,
//! record listings and reports, and the cache layer that keeps them fast.

use shadow_rs::shadow;
shadow!(build);

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logger;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod services;
pub mod state;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}

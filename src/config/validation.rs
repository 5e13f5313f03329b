//! Configuration validation logic
//!
//! This module provides validation methods for all configuration structures
//! to ensure configuration values are within acceptable ranges and formats.

use crate::config::error::ConfigError;
use crate::config::settings::{
    CacheBackend, CacheConfig, DatabaseConfig, FileSettings, LoggerSettings, Settings,
    TimeRecordSettings,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty
    /// - URL must be a PostgreSQL connection string
    /// - Max and min connections must be greater than 0
    /// - Min connections must not exceed max connections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a valid database connection string.",
            ));
        }

        if !self.is_valid_database_url() {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationError {
                field: "database.min_connections".to_string(),
                message: format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            });
        }

        Ok(())
    }

    fn is_valid_database_url(&self) -> bool {
        ["postgres://", "postgresql://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// # Validation Rules
    /// - Log level must be one of: trace, debug, info, warn, error
    /// - At least one output must be enabled
    /// - If file logging is enabled, path must not be empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl CacheConfig {
    /// Validate cache configuration
    ///
    /// Redis settings are only checked when Redis is the selected backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "cache.operation_timeout_ms",
                "Cache operation timeout must be greater than 0 milliseconds.",
            ));
        }

        if self.memory.max_size == 0 {
            return Err(ConfigError::validation(
                "cache.memory.max_size",
                "Memory cache size must be greater than 0.",
            ));
        }

        if self.enabled && self.backend == CacheBackend::Redis {
            let redis = &self.redis;
            if !(redis.url.starts_with("redis://") || redis.url.starts_with("rediss://")) {
                return Err(ConfigError::validation(
                    "cache.redis.url",
                    "Invalid Redis URL. Expected format: redis://host[:port][/db] or rediss://...",
                ));
            }
            if redis.pool_size == 0 {
                return Err(ConfigError::validation(
                    "cache.redis.pool_size",
                    "Redis pool size must be greater than 0.",
                ));
            }
            if redis.key_prefix.is_empty() || redis.key_prefix.contains(['*', '?', '[']) {
                return Err(ConfigError::validation(
                    "cache.redis.key_prefix",
                    "Redis key prefix must be non-empty and free of glob characters.",
                ));
            }
        }

        Ok(())
    }
}

impl TimeRecordSettings {
    /// Validate time record settings
    ///
    /// # Validation Rules
    /// - Page sizes must be greater than 0
    /// - Default page size must not exceed the maximum
    /// - Time zone, when set, must be a known IANA name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_per_page == 0 {
            return Err(ConfigError::validation(
                "time_records.default_per_page",
                "Default page size must be greater than 0.",
            ));
        }

        if self.max_per_page < self.default_per_page {
            return Err(ConfigError::ValidationError {
                field: "time_records.max_per_page".to_string(),
                message: format!(
                    "Max page size ({}) cannot be smaller than the default page size ({}).",
                    self.max_per_page, self.default_per_page
                ),
            });
        }

        if let Some(name) = &self.timezone
            && jiff::tz::TimeZone::get(name).is_err()
        {
            return Err(ConfigError::ValidationError {
                field: "time_records.timezone".to_string(),
                message: format!("Unknown time zone '{}'.", name),
            });
        }

        Ok(())
    }
}

impl Settings {
    /// Validate all configuration settings
    ///
    /// This method validates all sub-configurations and returns the first
    /// validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logger.validate()?;
        self.cache.validate()?;
        self.time_records.validate()?;
        Ok(())
    }
}

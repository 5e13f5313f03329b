//! Deployment environment, which picks the `{environment}.toml` overlay

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

/// Canonical name first, then accepted aliases.
const NAMES: &[(Environment, &[&str])] = &[
    (Environment::Development, &["development", "dev"]),
    (Environment::Test, &["test"]),
    (Environment::Staging, &["staging", "stage"]),
    (Environment::Production, &["production", "prod"]),
];

impl Environment {
    pub const ENV_VAR: &'static str = "TIMECLOCK_APP_ENV";

    /// Reads `TIMECLOCK_APP_ENV`, falling back to development when it is
    /// unset or unrecognised.
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        NAMES
            .iter()
            .find(|(env, _)| env == self)
            .and_then(|(_, names)| names.first().copied())
            .unwrap_or("development")
    }

    /// Overlay file loaded on top of `default.toml`.
    pub fn file_name(&self) -> String {
        format!("{}.toml", self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        NAMES
            .iter()
            .find(|(_, names)| names.contains(&wanted.as_str()))
            .map(|(env, _)| *env)
            .ok_or_else(|| {
                let valid: Vec<&str> = NAMES.iter().map(|(env, _)| env.as_str()).collect();
                ConfigError::EnvVarError(format!(
                    "Invalid environment '{}'. Valid values are: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

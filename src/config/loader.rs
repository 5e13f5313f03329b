//! Settings loading: TOML files first, then `TIMECLOCK_*` overrides.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "TIMECLOCK_CONFIG_DIR";
const CONFIG_FILE_ENV: &str = "TIMECLOCK_CONFIG_FILE";
const DEFAULT_CONFIG_DIR: &str = "config";

const ENV_PREFIX: &str = "TIMECLOCK";
const ENV_SEPARATOR: &str = "__";

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

/// Where the TOML part of the settings is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileSource {
    /// `default.toml` (required), `{environment}.toml`, `local.toml`.
    Layered(PathBuf),
    /// Exactly one required file.
    Single(PathBuf),
}

impl FileSource {
    /// Files in merge order, later ones winning, with whether each must exist.
    fn files(&self, environment: AppEnvironment) -> Vec<(PathBuf, bool)> {
        match self {
            FileSource::Single(path) => vec![(path.clone(), true)],
            FileSource::Layered(dir) => vec![
                (dir.join("default.toml"), true),
                (dir.join(environment.file_name()), false),
                (dir.join("local.toml"), false),
            ],
        }
    }
}

/// Loads [`Settings`] from TOML files and `TIMECLOCK_*` variables, the
/// variables taking precedence over every file.
#[derive(Debug)]
pub struct ConfigLoader {
    source: FileSource,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Picks the file source from `TIMECLOCK_CONFIG_DIR` or
    /// `TIMECLOCK_CONFIG_FILE` (never both) and the environment from
    /// `TIMECLOCK_APP_ENV`.
    pub fn new() -> Result<Self, ConfigError> {
        let dir = std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from);
        let file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);

        let source = match (dir, file) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::mutual_exclusivity(format!(
                    "{} and {} cannot both be set. Use the directory for layered \
                     configuration or the file for a single configuration file.",
                    CONFIG_DIR_ENV, CONFIG_FILE_ENV
                )));
            }
            (None, Some(file)) => FileSource::Single(file),
            (dir, None) => {
                FileSource::Layered(dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)))
            }
        };

        Ok(Self {
            source,
            environment: AppEnvironment::from_env(),
        })
    }

    /// `--config`: one file replaces whatever the environment selected.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = FileSource::Single(path.into());
        self
    }

    /// Picks the `{environment}.toml` overlay regardless of `TIMECLOCK_APP_ENV`.
    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /// Merges every source, then deserializes and validates the result.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in self.source.files(self.environment) {
            builder = add_file(builder, &path, required)?;
        }

        let settings: Settings = builder
            .add_source(env_overrides())
            .build()?
            .try_deserialize()
            .map_err(|e| {
                ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
            })?;

        settings.validate()?;
        Ok(settings)
    }
}

fn add_file(builder: Builder, path: &Path, required: bool) -> Result<Builder, ConfigError> {
    if required && !path.is_file() {
        return Err(ConfigError::file_not_found(format!(
            "Required configuration file not found: {}",
            path.display()
        )));
    }

    let name = path.to_str().ok_or_else(|| {
        ConfigError::ParseError(format!("Non UTF-8 configuration path: {}", path.display()))
    })?;

    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(required)))
}

/// `TIMECLOCK_TIME_RECORDS__COOLDOWN_SECONDS` -> `time_records.cooldown_seconds`
fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
        .ignore_empty(true)
        .try_parsing(true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::settings::CacheBackend;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Environment variables are process-wide.
    pub(crate) static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const DEFAULT_CONFIG: &str = r#"
[application]
name = "timeclock-test"
version = "1.0.0"

[database]
url = "postgres://localhost/timeclock"
max_connections = 10
min_connections = 1

[logger]
level = "info"

[cache]
enabled = true
backend = "memory"

[time_records]
cooldown_seconds = 60
default_per_page = 15
"#;

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).expect("Failed to write config file");
        }
        temp_dir
    }

    /// Restores every touched variable on drop.
    struct EnvGuard {
        vars_to_restore: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            let mut guard = Self {
                vars_to_restore: Vec::new(),
            };
            guard.remove(CONFIG_DIR_ENV);
            guard.remove(CONFIG_FILE_ENV);
            guard.remove(AppEnvironment::ENV_VAR);
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            self.vars_to_restore
                .push((key.to_string(), std::env::var(key).ok()));
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&mut self, key: &str) {
            self.vars_to_restore
                .push((key.to_string(), std::env::var(key).ok()));
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, original_value) in self.vars_to_restore.iter().rev() {
                unsafe {
                    match original_value {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_loader_new_default() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::new();

        let loader = ConfigLoader::new().expect("Should create loader");
        assert_eq!(loader.source, FileSource::Layered(PathBuf::from("config")));
        assert_eq!(loader.environment(), AppEnvironment::Development);
    }

    #[test]
    fn test_file_source_merge_order() {
        let layered = FileSource::Layered(PathBuf::from("conf"));
        assert_eq!(
            layered.files(AppEnvironment::Staging),
            vec![
                (PathBuf::from("conf/default.toml"), true),
                (PathBuf::from("conf/staging.toml"), false),
                (PathBuf::from("conf/local.toml"), false),
            ]
        );

        let single = FileSource::Single(PathBuf::from("/etc/timeclock.toml"));
        assert_eq!(
            single.files(AppEnvironment::Production),
            vec![(PathBuf::from("/etc/timeclock.toml"), true)]
        );
    }

    #[test]
    fn test_config_file_env_selects_single_file() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();
        env.set(CONFIG_FILE_ENV, "/etc/timeclock.toml");

        let loader = ConfigLoader::new().unwrap();
        assert_eq!(loader.source, FileSource::Single(PathBuf::from("/etc/timeclock.toml")));
    }

    #[test]
    fn test_config_loader_mutual_exclusivity_error() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        env.set(CONFIG_DIR_ENV, "/custom/config");
        env.set(CONFIG_FILE_ENV, "/path/to/config.toml");

        match ConfigLoader::new() {
            Err(ConfigError::MutualExclusivityError(msg)) => {
                assert!(msg.contains(CONFIG_DIR_ENV));
                assert!(msg.contains(CONFIG_FILE_ENV));
            }
            other => panic!("Expected MutualExclusivityError, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_default_toml() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());

        let result = ConfigLoader::new().unwrap().load();
        match result {
            Err(ConfigError::FileNotFound(msg)) => assert!(msg.contains("default.toml")),
            other => panic!("Expected FileNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_default_toml_only() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.set(AppEnvironment::ENV_VAR, "staging");

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        assert_eq!(settings.application.name, "timeclock-test");
        assert_eq!(settings.database.url, "postgres://localhost/timeclock");
        assert_eq!(settings.cache.backend, CacheBackend::Memory);
        assert_eq!(settings.time_records.default_per_page, 15);
    }

    #[test]
    fn test_load_full_precedence_chain() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let production_config = r#"
[application]
name = "timeclock-prod"

[cache]
backend = "redis"

[database]
url = "postgres://prod/timeclock"
"#;
        let local_config = r#"
[database]
url = "postgres://local/timeclock"
"#;

        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("production.toml", production_config),
            ("local.toml", local_config),
        ]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.set(AppEnvironment::ENV_VAR, "production");
        env.set("TIMECLOCK_TIME_RECORDS__COOLDOWN_SECONDS", "90");

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        // Environment variable wins over every file
        assert_eq!(settings.time_records.cooldown_seconds, 90);
        // local.toml wins over production.toml
        assert_eq!(settings.database.url, "postgres://local/timeclock");
        // production.toml wins over default.toml
        assert_eq!(settings.application.name, "timeclock-prod");
        assert_eq!(settings.cache.backend, CacheBackend::Redis);
        // default.toml fills the rest
        assert_eq!(settings.application.version, "1.0.0");
    }

    #[test]
    fn test_with_environment_overrides_env_var() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let test_config = "[time_records]\ncooldown_seconds = 0\n";
        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("test.toml", test_config),
        ]);
        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.set(AppEnvironment::ENV_VAR, "production");

        let settings = ConfigLoader::new()
            .unwrap()
            .with_environment(AppEnvironment::Test)
            .load()
            .expect("Should load settings");

        assert_eq!(settings.time_records.cooldown_seconds, 0);
    }

    #[test]
    fn test_load_single_file_mode() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("single.toml", DEFAULT_CONFIG)]);
        let settings = ConfigLoader::new()
            .unwrap()
            .with_file(temp_dir.path().join("single.toml"))
            .load()
            .expect("Should load settings");

        assert_eq!(settings.application.name, "timeclock-test");
    }

    #[test]
    fn test_invalid_settings_fail_validation() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::new();

        let broken = format!("{}\n[cache.memory]\nmax_size = 0\n", DEFAULT_CONFIG);
        let temp_dir = setup_config_dir(&[("broken.toml", broken.as_str())]);

        let result = ConfigLoader::new()
            .unwrap()
            .with_file(temp_dir.path().join("broken.toml"))
            .load();

        assert!(
            matches!(result, Err(ConfigError::ValidationError { field, .. }) if field == "cache.memory.max_size")
        );
    }
}

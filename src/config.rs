// Configuration file and storage path resolution

use crate::clock::{self, Clock};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "taskorg";

/// Environment variable naming the task database file
pub const DB_ENV_VAR: &str = "TASKORG_DB";

const CONFIG_FILE_NAME: &str = "config.yaml";
const DB_FILE_NAME: &str = "tasks.db";
const LOG_FILE_NAME: &str = "taskorg.log";
const MIN_TICK_MS: u64 = 100;

/// Settings read from `config.yaml`; every key is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Task database file; `~/` is expanded
    pub database: Option<PathBuf>,
    /// strftime pattern for the clock line
    pub clock_format: String,
    /// Clock refresh period in milliseconds
    pub tick_interval_ms: u64,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            clock_format: Clock::DEFAULT_FORMAT.to_string(),
            tick_interval_ms: 1000,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// `<config dir>/taskorg/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the named file, or the default file when it exists, or defaults
    ///
    /// A file named explicitly must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).wrap_err_with(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).context("Failed to parse YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        clock::validate_format(&self.clock_format)?;

        if self.tick_interval_ms < MIN_TICK_MS {
            return Err(eyre!(
                "tick_interval_ms must be at least {} (got {})",
                MIN_TICK_MS,
                self.tick_interval_ms
            ));
        }

        EnvFilter::try_new(&self.log_level).map_err(|e| eyre!("invalid log_level {:?}: {}", self.log_level, e))?;

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn clock(&self) -> Result<Clock> {
        Ok(Clock::new(self.clock_format.as_str())?)
    }

    /// Pick the task database: explicit path (flag or env), then config, then the data dir
    pub fn database_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(expand_home(path));
        }
        if let Some(path) = &self.database {
            return Ok(expand_home(path));
        }
        default_database_path().ok_or_else(|| eyre!("Could not determine a data directory; pass --db or set {}", DB_ENV_VAR))
    }
}

/// `<data dir>/taskorg/tasks.db`
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_NAME).join(DB_FILE_NAME))
}

/// Log file kept next to the database while the terminal UI owns the screen
pub fn log_path(database: &Path) -> PathBuf {
    database.with_file_name(LOG_FILE_NAME)
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.clock_format, "%H:%M:%S");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml("\n  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml("database: /tmp/my-tasks.db\ntick_interval_ms: 500\n").unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/my-tasks.db")));
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.clock_format, "%H:%M:%S");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_yaml("tick_interval_ms: 10").is_err());
        assert!(Config::from_yaml("clock_format: \"%Q\"").is_err());
        assert!(Config::from_yaml("colour: blue").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "clock_format: \"%H:%M\"\nlog_level: debug\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.clock_format, "%H:%M");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(temp.path().join("absent.yaml").as_path())).is_err());
    }

    #[test]
    fn test_database_path_precedence() {
        let config = Config {
            database: Some(PathBuf::from("/from/config.db")),
            ..Config::default()
        };

        let explicit = PathBuf::from("/from/flag.db");
        assert_eq!(config.database_path(Some(explicit.as_path())).unwrap(), explicit);
        assert_eq!(config.database_path(None).unwrap(), PathBuf::from("/from/config.db"));

        if let Some(default) = default_database_path() {
            assert_eq!(Config::default().database_path(None).unwrap(), default);
            assert!(default.ends_with("taskorg/tasks.db"));
        }
    }

    #[test]
    fn test_log_path_sits_next_to_database() {
        assert_eq!(
            log_path(Path::new("/data/taskorg/tasks.db")),
            PathBuf::from("/data/taskorg/taskorg.log")
        );
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/tasks.db")), home.join("tasks.db"));
        }
        assert_eq!(expand_home(Path::new("/abs/tasks.db")), PathBuf::from("/abs/tasks.db"));
    }
}

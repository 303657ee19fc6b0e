/// Configuration for prompt-keeper
///
/// Settings are read from a TOML file. Every field has a default so an empty
/// (or missing) file yields a working setup.

use crate::error::{KeeperError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl DatabaseSettings {
    /// Settings for a database file at `path`, everything else default
    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl SearchSettings {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prompt-keeper")
        .join("prompts.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_secs() -> u64 {
    10
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_cache_capacity() -> usize {
    50
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Parse and validate settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Like [`Settings::load`], but a missing file means defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| KeeperError::Config(format!("failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(KeeperError::Config(
                "database.max_connections must be >= 1".to_string(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(KeeperError::Config("cache.capacity must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(settings.database.busy_timeout(), Duration::from_secs(10));
        assert_eq!(settings.search.quiet_period(), Duration::from_millis(300));
        assert_eq!(settings.cache.capacity, 50);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.database.path.ends_with("prompt-keeper/prompts.db"));
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [database]
            path = "/tmp/p.db"

            [search]
            debounce_ms = 150
            "#,
        )
        .unwrap();

        assert_eq!(settings.database.path, PathBuf::from("/tmp/p.db"));
        assert_eq!(settings.database.busy_timeout_secs, 10);
        assert_eq!(settings.search.debounce_ms, 150);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = Settings::from_toml("[cache]\ncapacity = 0\n");
        assert!(matches!(result, Err(KeeperError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings.cache.capacity, 50);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.logging.level, "debug");
    }
}

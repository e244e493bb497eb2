//! Configuration for the host group store

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HostGroupError;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hostgroup")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file (":memory:" for a throwaway database)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum pooled connections
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// How long to wait for a free pooled connection
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// SQLite busy_timeout applied to every pooled connection
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Upper bound on a single store operation, checkout included
    #[serde(default = "default_query_timeout")]
    pub query_timeout_ms: u64,

    /// chrono format string used to render create/update times
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

fn default_database_url() -> String {
    default_data_dir()
        .join("hostgroup.db")
        .to_string_lossy()
        .into_owned()
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_query_timeout() -> u64 {
    10_000
}

pub fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_max_size: default_pool_max_size(),
            connection_timeout_secs: default_connection_timeout(),
            busy_timeout_ms: default_busy_timeout(),
            query_timeout_ms: default_query_timeout(),
            time_format: default_time_format(),
        }
    }
}

impl Config {
    /// Config pointing at a database file, everything else default
    pub fn with_database<P: AsRef<Path>>(path: P) -> Self {
        Self {
            database_url: path.as_ref().to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HostGroupError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| HostGroupError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| HostGroupError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), HostGroupError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| HostGroupError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HostGroupError::Config(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| HostGroupError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Default config file path
    pub fn config_path() -> PathBuf {
        default_data_dir().join("config.toml")
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url == ":memory:"
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            database_url = "/tmp/groups.db"
            pool_max_size = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.database_url, "/tmp/groups.db");
        assert_eq!(config.pool_max_size, 2);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.time_format, "%Y-%m-%d %H:%M:%S");
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::with_database(dir.path().join("groups.db"));
        config.query_timeout_ms = 250;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.database_url, config.database_url);
        assert_eq!(loaded.query_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pool_max_size = \"lots\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, HostGroupError::Config(_)));
    }
}

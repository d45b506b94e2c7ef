use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_DB_FILE: &str = "flashback.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file. Relative paths resolve against the config directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging for file databases.
    pub wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 10_000,
            wal: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Resolve the database file location for a given config directory.
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        match &self.database.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_dir.join(path),
            None => config_dir.join(DEFAULT_DB_FILE),
        }
    }
}

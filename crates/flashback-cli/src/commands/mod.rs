pub mod capture;
pub mod migrate;
pub mod search;
pub mod setup;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use flashback_config::{AppConfig, ConfigLoader};
use flashback_db::{ConnectionOptions, Database, Migrator};
use rusqlite::Connection;

use crate::cli::GlobalArgs;

/// Resolved config plus the paths every command works from.
pub struct Context {
    pub config_dir: PathBuf,
    pub config: AppConfig,
    db_override: Option<PathBuf>,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let config_dir = global
            .config_dir
            .clone()
            .unwrap_or_else(ConfigLoader::default_config_dir);
        let config = ConfigLoader::new(&config_dir)
            .load()
            .context("failed to load config")?;
        Ok(Self::new(config_dir, config, global.db.clone()))
    }

    pub fn new(config_dir: PathBuf, config: AppConfig, db_override: Option<PathBuf>) -> Self {
        Self {
            config_dir,
            config,
            db_override,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.db_override
            .clone()
            .unwrap_or_else(|| self.config.database_path(&self.config_dir))
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            busy_timeout: Duration::from_millis(self.config.database.busy_timeout_ms),
            wal: self.config.database.wal,
        }
    }

    pub fn open_database(&self) -> Result<Database> {
        let path = self.database_path();
        Database::open(&path, self.connection_options())
            .with_context(|| format!("cannot open database at {}", path.display()))
    }
}

/// Snapshot commands refuse to run against a partially migrated schema.
pub(crate) fn ensure_migrated(conn: &Connection) -> Result<()> {
    let pending = Migrator::builtin()?.pending(conn)?;
    if !pending.is_empty() {
        bail!(
            "database has {} pending migration(s); run `flashback migrate` first",
            pending.len()
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_context(dir: &std::path::Path) -> Context {
    Context::new(dir.to_path_buf(), AppConfig::default(), None)
}

use std::path::{Path, PathBuf};

use flashback_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const CONFIG_FILE_NAMES: &[&str] = &["config.yml", "config.yaml", "config.toml"];

pub const ENV_DB_PATH: &str = "FLASHBACK_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "FLASHBACK_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "FLASHBACK_LOG_JSON";

/// Locates and parses the Flashback config file, then layers environment
/// overrides on top.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// `~/.flashback`, falling back to `./.flashback` when there is no home.
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flashback")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// First existing config file in the directory, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the file config (or defaults) with process environment overrides.
    pub fn load(&self) -> Result<AppConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(&self, env: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path() {
            Some(path) => {
                info!("loading config from {}", path.display());
                parse_config_file(&path)?
            }
            None => {
                debug!(
                    "no config file in {}, using defaults",
                    self.config_dir.display()
                );
                AppConfig::default()
            }
        };
        apply_env_overrides(&mut config, env)?;
        Ok(config)
    }
}

/// Parse a YAML or TOML config file, chosen by extension.
pub fn parse_config_file(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

fn apply_env_overrides<F>(config: &mut AppConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
        config.database.path = Some(PathBuf::from(path.trim()));
    }
    if let Some(level) = env(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        config.log.level = level.trim().to_string();
    }
    if let Some(raw) = env(ENV_LOG_JSON) {
        config.log.json = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            other => {
                return Err(Error::Config(format!(
                    "{ENV_LOG_JSON} must be a boolean, got {other:?}"
                )));
            }
        };
    }
    Ok(())
}

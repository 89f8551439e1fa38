use std::path::{Path, PathBuf};

use fynanpro_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Environment variable holding a database path or connection string.
pub const DATABASE_ENV_VAR: &str = "FYNANPRO_DATABASE";

const CONFIG_FILE_NAMES: [&str; 3] = ["config.yml", "config.yaml", "config.toml"];

/// Loads `AppConfig` once at startup from a config directory and the
/// process environment.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Loader rooted at `~/.fynanpro`, falling back to the working directory
    /// when no home directory is known.
    pub fn with_default_dir() -> Self {
        Self::new(Self::default_config_dir())
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fynanpro")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Read the first config file found in the config directory (defaults
    /// when there is none), then apply environment overrides.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = match self.find_config_file() {
            Some(path) => Self::load_file(&path)?,
            None => {
                debug!(
                    "no config file in {}, using defaults",
                    self.config_dir.display()
                );
                AppConfig::default()
            }
        };
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Parse a single config file. The format is chosen by extension.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        info!("config loaded from {}", path.display());
        Ok(config)
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(db) = lookup(DATABASE_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        debug!("database location overridden by {DATABASE_ENV_VAR}");
        config.database.path = db;
    }
}

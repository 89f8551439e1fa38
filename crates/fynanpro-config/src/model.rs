use std::fmt;
use std::path::PathBuf;

use fynanpro_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "finance_planner.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// A filesystem path or a `sqlite://` connection string.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE_PATH.to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn location(&self) -> Result<DatabaseLocation> {
        DatabaseLocation::parse(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
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

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl DatabaseLocation {
    /// Accepts a plain path, `:memory:`, or a connection string of the form
    /// `sqlite://<path>`, `sqlite:<path>` or `sqlite::memory:`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Config("database path cannot be empty".into()));
        }

        let path = raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
            .unwrap_or(raw);

        if path.is_empty() {
            return Err(Error::Config(format!(
                "database connection string has no path: {raw}"
            )));
        }
        if path == ":memory:" {
            return Ok(DatabaseLocation::Memory);
        }

        // Drop any query string (`?mode=rwc` and friends); options are fixed here.
        let path = path.split('?').next().unwrap_or(path);
        Ok(DatabaseLocation::File(PathBuf::from(path)))
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => f.write_str(":memory:"),
        }
    }
}

use std::time::Duration;

use fynanpro_common::{Error, Result};
use fynanpro_config::{DatabaseConfig, DatabaseLocation};
use rusqlite::Connection;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SQLite connections for one configured database location.
///
/// Built once from configuration and handed to whoever needs a connection,
/// so no code path reaches for a hard-coded database path.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    location: DatabaseLocation,
}

impl ConnectionFactory {
    pub fn new(location: DatabaseLocation) -> Self {
        Self { location }
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(config.location()?))
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    /// Whether the database already has data on disk. Always false for
    /// in-memory databases.
    pub fn exists(&self) -> bool {
        match &self.location {
            DatabaseLocation::File(path) => path.is_file(),
            DatabaseLocation::Memory => false,
        }
    }

    pub fn open(&self) -> Result<Connection> {
        let conn = match &self.location {
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                info!("opening database at {}", path.display());
                let conn = Connection::open(path)
                    .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
                conn.execute_batch("PRAGMA journal_mode=WAL;")
                    .map_err(|e| Error::Database(format!("failed to set journal mode: {e}")))?;
                conn
            }
            DatabaseLocation::Memory => {
                debug!("opening in-memory database");
                Connection::open_in_memory().map_err(|e| {
                    Error::Database(format!("failed to open in-memory database: {e}"))
                })?
            }
        };

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;

        Ok(conn)
    }
}

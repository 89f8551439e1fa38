use std::path::Path;

use fynanpro_common::{Error, Result};
use rusqlite::{Connection, params};
use tracing::info;

use crate::db_err;

/// Write a consistent copy of the open database to `dest`.
///
/// Refuses to overwrite an existing file. Must not be called inside an open
/// transaction.
pub fn backup_to(conn: &Connection, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(Error::Other(format!(
            "backup destination {} already exists",
            dest.display()
        )));
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let target = dest
        .to_str()
        .ok_or_else(|| Error::Other(format!("backup path is not UTF-8: {}", dest.display())))?;
    conn.execute("VACUUM INTO ?1", params![target])
        .map_err(db_err("failed to write backup"))?;

    info!("database backed up to {}", dest.display());
    Ok(())
}

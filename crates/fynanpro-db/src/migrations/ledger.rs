//! The `schema_migrations` table: which named migrations have run.

use chrono::{DateTime, Utc};
use fynanpro_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

pub const LEDGER_TABLE: &str = "schema_migrations";

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Create the ledger table if it is missing. A no-op otherwise.
pub fn ensure_ledger_exists(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| Error::Ledger(format!("failed to create {LEDGER_TABLE}: {e}")))
}

pub fn has_run(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM schema_migrations WHERE name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()
        .map_err(|e| Error::Ledger(format!("failed to look up migration {name}: {e}")))?;
    Ok(found.is_some())
}

/// Record `name` as applied. Fails if it is already recorded; the caller's
/// transaction must then be rolled back.
pub fn mark_run(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (name) VALUES (?1)",
        params![name],
    )
    .map_err(|e| Error::Ledger(format!("failed to record migration {name}: {e}")))?;
    Ok(())
}

/// All ledger rows in the order they were applied.
pub fn applied(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    let mut stmt = conn
        .prepare("SELECT name, applied_at FROM schema_migrations ORDER BY id ASC")
        .map_err(|e| Error::Ledger(format!("failed to prepare ledger query: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(MigrationRecord {
                name: row.get(0)?,
                applied_at: parse_datetime(row.get::<_, String>(1)?),
            })
        })
        .map_err(|e| Error::Ledger(format!("failed to query ledger: {e}")))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(|e| Error::Ledger(format!("failed to read ledger row: {e}")))?);
    }
    Ok(records)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::test_support::{count, memory};

    #[test]
    fn ensure_ledger_is_idempotent() {
        let conn = memory();
        ensure_ledger_exists(&conn).unwrap();
        mark_run(&conn, "000_init").unwrap();
        ensure_ledger_exists(&conn).unwrap();

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM schema_migrations"), 1);
    }

    #[test]
    fn mark_then_has_run() {
        let conn = memory();
        ensure_ledger_exists(&conn).unwrap();

        assert!(!has_run(&conn, "001_add_accounts_balance").unwrap());
        mark_run(&conn, "001_add_accounts_balance").unwrap();
        assert!(has_run(&conn, "001_add_accounts_balance").unwrap());
        assert!(!has_run(&conn, "002_fix_transactions_type_column").unwrap());
    }

    #[test]
    fn marking_twice_is_rejected() {
        let conn = memory();
        ensure_ledger_exists(&conn).unwrap();
        mark_run(&conn, "000_init").unwrap();

        let err = mark_run(&conn, "000_init").unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM schema_migrations"), 1);
    }

    #[test]
    fn has_run_without_ledger_is_a_ledger_error() {
        let conn = memory();
        let err = has_run(&conn, "000_init").unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));
    }

    #[test]
    fn applied_lists_records_in_order() {
        let conn = memory();
        ensure_ledger_exists(&conn).unwrap();
        mark_run(&conn, "b").unwrap();
        mark_run(&conn, "a").unwrap();

        let records = applied(&conn).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(records[0].applied_at > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn parses_sqlite_timestamps() {
        let dt = parse_datetime("2024-03-01 12:30:00".to_string());
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }
}

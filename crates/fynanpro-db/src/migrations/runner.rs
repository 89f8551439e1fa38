use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use fynanpro_common::{Error, Result};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::ledger::{self, LEDGER_TABLE};
use super::{Migration, registry};
use crate::db_err;
use crate::probe::{SchemaProbe, SqliteProbe};

/// Applies registered migrations exactly once each, in registration order.
#[derive(Debug)]
pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

/// What a single `run` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// Migrations already recorded in the ledger.
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Applied,
    Pending,
    /// Recorded in the ledger but no longer registered.
    Unregistered,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationRunner {
    /// Build a runner over `migrations`. Names must be unique.
    pub fn new(migrations: Vec<Migration>) -> Result<Self> {
        let mut seen = HashSet::new();
        for migration in &migrations {
            if !seen.insert(migration.name) {
                return Err(Error::DuplicateMigration(migration.name.to_string()));
            }
        }
        Ok(Self { migrations })
    }

    /// Runner over the application's full migration registry.
    pub fn with_defaults() -> Result<Self> {
        Self::new(registry())
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Apply every migration not yet in the ledger.
    ///
    /// Each migration runs in its own transaction together with its ledger
    /// insert. The first failure rolls that transaction back and stops the
    /// run; nothing after it is attempted.
    pub fn run(&self, conn: &mut Connection) -> Result<RunReport> {
        info!("starting migration run ({} registered)", self.migrations.len());
        ledger::ensure_ledger_exists(conn)?;
        self.warn_unregistered(conn)?;

        // Table rebuilds drop and recreate referenced tables. SQLite ignores
        // this pragma inside a transaction, so it is set around the whole run.
        let foreign_keys = foreign_keys_enabled(conn)?;
        set_foreign_keys(conn, false)?;
        let outcome = self.apply_pending(conn);
        let restored = set_foreign_keys(conn, foreign_keys);
        let report = outcome?;
        restored?;

        if report.is_noop() {
            info!("all migrations were already applied");
        } else {
            info!("{} migrations applied", report.applied.len());
        }
        Ok(report)
    }

    fn apply_pending(&self, conn: &mut Connection) -> Result<RunReport> {
        let mut report = RunReport::default();
        for migration in &self.migrations {
            if ledger::has_run(conn, migration.name)? {
                debug!(migration = migration.name, "already applied, skipping");
                report.skipped.push(migration.name.to_string());
                continue;
            }

            info!(migration = migration.name, "applying migration");
            if let Err(e) = apply(conn, migration) {
                error!(migration = migration.name, "migration failed, run aborted: {e}");
                return Err(e);
            }
            info!(migration = migration.name, "migration applied");
            report.applied.push(migration.name.to_string());
        }
        Ok(report)
    }

    /// Registered migrations not yet recorded in the ledger. Does not create
    /// the ledger.
    pub fn pending(&self, conn: &Connection) -> Result<Vec<&'static str>> {
        let applied = applied_names(conn)?;
        Ok(self
            .migrations
            .iter()
            .map(|m| m.name)
            .filter(|name| !applied.contains_key(*name))
            .collect())
    }

    /// Per-migration state, registry order first, followed by any ledger
    /// entries that are no longer registered. Does not create the ledger.
    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let applied = applied_names(conn)?;

        let mut statuses: Vec<MigrationStatus> = self
            .migrations
            .iter()
            .map(|m| match applied.get(m.name) {
                Some(at) => MigrationStatus {
                    name: m.name.to_string(),
                    state: MigrationState::Applied,
                    applied_at: Some(*at),
                },
                None => MigrationStatus {
                    name: m.name.to_string(),
                    state: MigrationState::Pending,
                    applied_at: None,
                },
            })
            .collect();

        let registered: HashSet<_> = self.migrations.iter().map(|m| m.name).collect();
        if ledger_exists(conn)? {
            for record in ledger::applied(conn)? {
                if !registered.contains(record.name.as_str()) {
                    statuses.push(MigrationStatus {
                        name: record.name,
                        state: MigrationState::Unregistered,
                        applied_at: Some(record.applied_at),
                    });
                }
            }
        }
        Ok(statuses)
    }

    fn warn_unregistered(&self, conn: &Connection) -> Result<()> {
        let registered: HashSet<_> = self.migrations.iter().map(|m| m.name).collect();
        for record in ledger::applied(conn)? {
            if !registered.contains(record.name.as_str()) {
                warn!(
                    migration = record.name.as_str(),
                    "ledger contains a migration that is no longer registered"
                );
            }
        }
        Ok(())
    }
}

fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::Migration {
            name: migration.name.to_string(),
            message: format!("failed to begin transaction: {e}"),
        })?;

    let outcome = {
        let probe = SqliteProbe::new(&tx);
        (migration.body)(&tx, &probe).map_err(|e| Error::Migration {
            name: migration.name.to_string(),
            message: e.to_string(),
        })
    };
    let outcome = outcome
        .and_then(|()| warn_foreign_key_violations(&tx, migration.name))
        .and_then(|()| ledger::mark_run(&tx, migration.name));

    if let Err(e) = outcome {
        if let Err(rollback_err) = tx.rollback() {
            error!(
                migration = migration.name,
                "rollback after failure also failed: {rollback_err}"
            );
        }
        return Err(e);
    }

    tx.commit().map_err(|e| Error::Migration {
        name: migration.name.to_string(),
        message: format!("failed to commit: {e}"),
    })
}

/// Foreign keys are off while migrations run; report rows a migration left
/// (or found) without a parent. Legacy databases often carry these already.
fn warn_foreign_key_violations(conn: &Connection, name: &str) -> Result<()> {
    let violations: i64 = conn
        .query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| {
            row.get(0)
        })
        .map_err(db_err("failed to run foreign key check"))?;
    if violations > 0 {
        warn!(migration = name, "{violations} rows violate foreign key constraints");
    }
    Ok(())
}

fn foreign_keys_enabled(conn: &Connection) -> Result<bool> {
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .map_err(db_err("failed to read foreign_keys pragma"))?;
    Ok(enabled != 0)
}

fn set_foreign_keys(conn: &Connection, enabled: bool) -> Result<()> {
    let value = if enabled { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys={value};"))
        .map_err(db_err("failed to set foreign_keys pragma"))
}

fn ledger_exists(conn: &Connection) -> Result<bool> {
    SqliteProbe::new(conn)
        .table_exists(LEDGER_TABLE)
        .map_err(|e| Error::Ledger(e.to_string()))
}

fn applied_names(conn: &Connection) -> Result<HashMap<String, DateTime<Utc>>> {
    if !ledger_exists(conn)? {
        return Ok(HashMap::new());
    }
    Ok(ledger::applied(conn)?
        .into_iter()
        .map(|r| (r.name, r.applied_at))
        .collect())
}

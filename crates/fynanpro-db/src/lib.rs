pub mod backup;
pub mod connection;
pub mod inspect;
pub mod migrations;
pub mod probe;

use std::path::Path;

use fynanpro_common::{Error, Result};
use fynanpro_config::DatabaseLocation;
use tracing::info;

pub use connection::ConnectionFactory;
pub use migrations::{
    Migration, MigrationBody, MigrationRecord, MigrationRunner, MigrationState, MigrationStatus,
    RunReport,
};
pub use probe::{SchemaProbe, SqliteProbe};

/// Apply every registered migration to the database at `db_path`.
///
/// Intended to be called once at startup, before anything else touches the
/// database. The connection is closed before this returns. Any error means
/// the schema is not in a known state and the caller must not continue.
pub fn run_all_migrations(db_path: &Path) -> Result<RunReport> {
    let factory = ConnectionFactory::new(DatabaseLocation::File(db_path.to_path_buf()));
    migrate(&factory)
}

/// Apply every registered migration using connections from `factory`.
pub fn migrate(factory: &ConnectionFactory) -> Result<RunReport> {
    let runner = MigrationRunner::with_defaults()?;
    let mut conn = factory.open()?;
    let report = runner.run(&mut conn)?;
    drop(conn);
    info!(
        "migration pass finished for {} ({} applied, {} already applied)",
        factory.location(),
        report.applied.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Map a rusqlite error into `Error::Database` with a short description of
/// what was being attempted.
pub(crate) fn db_err(what: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::Database(format!("{what}: {e}"))
}

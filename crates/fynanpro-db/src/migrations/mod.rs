//! Schema migrations tracked by name in the `schema_migrations` ledger.
//!
//! Each migration is a named body that inspects the schema through a
//! [`SchemaProbe`] and only changes what is missing. The runner applies them
//! in registration order, one transaction per migration, and records each
//! success in the ledger so it never runs again.

pub mod ledger;
pub mod runner;

mod m000_base_schema;
mod m001_accounts_balance;
mod m002_transactions_type;
mod m003_categories_type;
mod m004_seed_categories;
mod m005_budgets_goals;
mod m006_subscription;
mod m007_support_chat;
mod normalize;

use fynanpro_common::Result;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db_err;
use crate::probe::{SchemaProbe, SqliteProbe};

pub use ledger::MigrationRecord;
pub use runner::{MigrationRunner, MigrationState, MigrationStatus, RunReport};

/// A migration body. Receives the connection (already inside the
/// migration's transaction) and a probe over that same connection.
pub type MigrationBody = fn(&Connection, &dyn SchemaProbe) -> Result<()>;

/// A named migration step.
#[derive(Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub body: MigrationBody,
}

impl Migration {
    pub const fn new(name: &'static str, body: MigrationBody) -> Self {
        Self { name, body }
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

/// Every migration, in the order it must be applied. Later entries assume
/// the tables and columns produced by earlier ones.
pub fn registry() -> Vec<Migration> {
    vec![
        Migration::new("000_create_base_schema", m000_base_schema::up),
        Migration::new("001_add_accounts_balance", m001_accounts_balance::up),
        Migration::new("002_fix_transactions_type_column", m002_transactions_type::up),
        Migration::new("003_fix_categories_type_column", m003_categories_type::up),
        Migration::new("004_seed_default_categories", m004_seed_categories::up),
        Migration::new("005_create_budgets_and_goals", m005_budgets_goals::up),
        Migration::new("006_add_user_subscription_columns", m006_subscription::up),
        Migration::new("007_create_support_chat", m007_support_chat::up),
    ]
}

/// Drop a column kept only for importing old data, together with any index
/// that covers it. SQLite refuses to drop indexed columns.
pub(crate) fn drop_legacy_column(conn: &Connection, table: &str, column: &str) -> Result<()> {
    let probe = SqliteProbe::new(conn);
    for index in probe.indexes_on_column(table, column)? {
        conn.execute_batch(&format!("DROP INDEX IF EXISTS \"{index}\";"))
            .map_err(db_err("failed to drop legacy index"))?;
        debug!("dropped index {index} on legacy column {table}.{column}");
    }
    conn.execute_batch(&format!("ALTER TABLE {table} DROP COLUMN \"{column}\";"))
        .map_err(db_err("failed to drop legacy column"))?;
    info!("dropped legacy column {table}.{column}");
    Ok(())
}

/// Quote a list of string literals for an SQL `IN (...)` clause. Only used
/// with compile-time constants.
pub(crate) fn sql_string_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    use crate::probe::SqliteProbe;

    use super::MigrationBody;

    pub fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        conn
    }

    pub fn apply(conn: &Connection, body: MigrationBody) {
        body(conn, &SqliteProbe::new(conn)).unwrap();
    }

    pub fn columns(conn: &Connection, table: &str) -> Vec<String> {
        SqliteProbe::new(conn).columns(table).unwrap()
    }

    pub fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}

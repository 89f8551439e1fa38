use fynanpro_common::Result;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db_err;
use crate::probe::SchemaProbe;

const BASE_TABLES: [&str; 4] = ["users", "accounts", "transactions", "categories"];

const USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

const ACCOUNTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    bank_name TEXT,
    account_type TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

/// Also used to recreate a missing categories table later in the sequence.
pub(crate) const CATEGORIES_TABLE: &str = "CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    category_type TEXT NOT NULL CHECK (category_type IN ('receita', 'despesa')),
    description TEXT,
    icon TEXT,
    parent_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

const TRANSACTIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
    account_id INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    description TEXT,
    amount REAL NOT NULL,
    date DATE NOT NULL,
    transaction_type TEXT NOT NULL
        CHECK (transaction_type IN ('receita', 'despesa', 'transferencia')),
    transfer_account_id INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
    notes TEXT,
    tags TEXT,
    is_confirmed INTEGER NOT NULL DEFAULT 0,
    is_reconciled INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

/// Create the core tables in their current shape. Tables that already exist
/// are left alone; later migrations bring legacy shapes forward.
pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    for table in BASE_TABLES {
        if probe.table_exists(table)? {
            debug!("table {table} already present, keeping its current shape");
        }
    }

    for ddl in [USERS_TABLE, ACCOUNTS_TABLE, CATEGORIES_TABLE, TRANSACTIONS_TABLE] {
        conn.execute_batch(ddl)
            .map_err(db_err("failed to create base tables"))?;
    }

    // Legacy tables may predate these columns.
    let indexes = [
        ("idx_accounts_user", "accounts", "user_id"),
        ("idx_transactions_account", "transactions", "account_id"),
        ("idx_transactions_date", "transactions", "date"),
        ("idx_categories_user", "categories", "user_id"),
    ];
    for (index, table, column) in indexes {
        if probe.column_exists(table, column)? {
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table}({column});"
            ))
            .map_err(db_err("failed to create base index"))?;
        } else {
            debug!("skipping {index}: {table}.{column} does not exist");
        }
    }

    info!("base schema in place");
    Ok(())
}

use fynanpro_common::Result;
use rusqlite::Connection;
use tracing::info;

use crate::db_err;
use crate::probe::SchemaProbe;

/// Budgets, savings goals, and contributions toward goals.
pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS budgets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            amount REAL NOT NULL,
            period_type TEXT NOT NULL DEFAULT 'monthly',
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            alert_percentage INTEGER NOT NULL DEFAULT 80,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            target_amount REAL NOT NULL,
            target_date DATE NOT NULL,
            category TEXT NOT NULL DEFAULT 'other',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS goal_contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id INTEGER NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
            amount REAL NOT NULL,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .map_err(db_err("failed to create budget and goal tables"))?;

    // Budgets created by the first planning release lacked alerting.
    for (column, decl) in [
        ("alert_percentage", "INTEGER NOT NULL DEFAULT 80"),
        ("is_active", "INTEGER NOT NULL DEFAULT 1"),
    ] {
        if !probe.column_exists("budgets", column)? {
            conn.execute_batch(&format!("ALTER TABLE budgets ADD COLUMN {column} {decl};"))
                .map_err(db_err("failed to add budget column"))?;
            info!("added budgets.{column}");
        }
    }

    let indexes = [
        ("idx_budgets_user", "budgets", "user_id"),
        ("idx_goals_user", "goals", "user_id"),
        ("idx_goal_contributions_goal", "goal_contributions", "goal_id"),
    ];
    for (index, table, column) in indexes {
        if probe.column_exists(table, column)? {
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table}({column});"
            ))
            .map_err(db_err("failed to create planning index"))?;
        }
    }

    info!("budget and goal tables in place");
    Ok(())
}

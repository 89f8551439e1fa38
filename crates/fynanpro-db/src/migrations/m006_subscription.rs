use fynanpro_common::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db_err;
use crate::probe::SchemaProbe;

/// Plan and payment columns on `users`. Payment-provider webhooks update
/// these after a confirmed charge.
const SUBSCRIPTION_COLUMNS: [(&str, &str); 7] = [
    ("plan_type", "TEXT NOT NULL DEFAULT 'trial'"),
    ("plan_start_date", "DATETIME"),
    ("stripe_customer_id", "TEXT"),
    ("stripe_subscription_id", "TEXT"),
    ("payment_method", "TEXT NOT NULL DEFAULT 'free'"),
    ("last_payment_date", "DATETIME"),
    ("total_paid", "REAL NOT NULL DEFAULT 0"),
];

pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    if !probe.table_exists("users")? {
        warn!("users table missing, skipping subscription columns");
        return Ok(());
    }

    for (column, decl) in SUBSCRIPTION_COLUMNS {
        if probe.column_exists("users", column)? {
            continue;
        }
        conn.execute_batch(&format!("ALTER TABLE users ADD COLUMN {column} {decl};"))
            .map_err(db_err("failed to add subscription column"))?;
        info!("added users.{column}");
    }

    // Existing users start their trial from the moment they signed up.
    let start = if probe.column_exists("users", "created_at")? {
        "COALESCE(created_at, CURRENT_TIMESTAMP)"
    } else {
        "CURRENT_TIMESTAMP"
    };
    let backfilled = conn
        .execute(
            &format!("UPDATE users SET plan_start_date = {start} WHERE plan_start_date IS NULL"),
            [],
        )
        .map_err(db_err("failed to backfill plan_start_date"))?;
    if backfilled > 0 {
        info!("{backfilled} users given a plan start date");
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_users_stripe_customer ON users(stripe_customer_id);",
    )
    .map_err(db_err("failed to index users.stripe_customer_id"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::m000_base_schema;
    use crate::migrations::test_support::{apply, columns, memory};

    #[test]
    fn adds_plan_columns_with_defaults() {
        let conn = memory();
        apply(&conn, m000_base_schema::up);
        conn.execute(
            "INSERT INTO users (email, password_hash, created_at)
             VALUES ('ana@example.com', 'hash', '2024-05-01 10:00:00')",
            [],
        )
        .unwrap();

        apply(&conn, up);

        let cols = columns(&conn, "users");
        for (column, _) in SUBSCRIPTION_COLUMNS {
            assert!(cols.contains(&column.to_string()), "{column} missing");
        }

        let (plan, method, paid, start): (String, String, f64, String) = conn
            .query_row(
                "SELECT plan_type, payment_method, total_paid, plan_start_date FROM users",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(plan, "trial");
        assert_eq!(method, "free");
        assert_eq!(paid, 0.0);
        assert_eq!(start, "2024-05-01 10:00:00");
    }

    #[test]
    fn partially_upgraded_users_table() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, plan_type TEXT DEFAULT 'premium');
             INSERT INTO users (email) VALUES ('x@y.z');",
        )
        .unwrap();

        apply(&conn, up);
        apply(&conn, up);

        let plan: String = conn
            .query_row("SELECT plan_type FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(plan, "premium");
        let start: Option<String> = conn
            .query_row("SELECT plan_start_date FROM users", [], |row| row.get(0))
            .unwrap();
        assert!(start.is_some());
    }
}

use std::collections::BTreeMap;

use fynanpro_common::{Result, TransactionKind};
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::db_err;
use crate::probe::SchemaProbe;

/// How a transaction label moves its account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BalanceEffect {
    Credit,
    Debit,
    Neutral,
}

fn balance_effect(label: &str) -> Option<BalanceEffect> {
    match label.trim().to_lowercase().as_str() {
        "transfer_in" => Some(BalanceEffect::Credit),
        "transfer_out" => Some(BalanceEffect::Debit),
        other => TransactionKind::from_label(other).map(|kind| match kind {
            TransactionKind::Income => BalanceEffect::Credit,
            TransactionKind::Expense => BalanceEffect::Debit,
            TransactionKind::Transfer => BalanceEffect::Neutral,
        }),
    }
}

#[derive(Debug, Default)]
struct Backfill {
    balances: BTreeMap<i64, f64>,
    /// Labels that could not be mapped, with how many rows carried each.
    unmapped: BTreeMap<String, usize>,
}

/// Add `accounts.balance` and fill it from transaction history.
pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    if !probe.table_exists("accounts")? {
        warn!("accounts table missing, skipping balance column");
        return Ok(());
    }
    if probe.column_exists("accounts", "balance")? {
        info!("accounts.balance already exists");
        return Ok(());
    }

    conn.execute_batch("ALTER TABLE accounts ADD COLUMN balance REAL NOT NULL DEFAULT 0;")
        .map_err(db_err("failed to add accounts.balance"))?;
    info!("added accounts.balance");

    if !probe.table_exists("transactions")? || !probe.column_exists("transactions", "account_id")? {
        info!("no transaction history to backfill, balances start at 0");
        return Ok(());
    }
    let Some(kind_column) = kind_column(probe)? else {
        warn!("transactions has no kind column, balances start at 0");
        return Ok(());
    };

    let backfill = compute_balances(conn, kind_column)?;
    for (account_id, balance) in &backfill.balances {
        conn.execute(
            "UPDATE accounts SET balance = ?1 WHERE id = ?2",
            params![balance, account_id],
        )
        .map_err(db_err("failed to write account balance"))?;
        debug!("account {account_id}: balance backfilled to {balance:.2}");
    }

    for (label, rows) in &backfill.unmapped {
        warn!("{rows} transactions with unmapped kind '{label}' did not count toward balances");
    }
    info!("backfilled balances for {} accounts", backfill.balances.len());
    Ok(())
}

/// The column holding the transaction kind, preferring the current name.
fn kind_column(probe: &dyn SchemaProbe) -> Result<Option<&'static str>> {
    for column in ["transaction_type", "type"] {
        if probe.column_exists("transactions", column)? {
            return Ok(Some(column));
        }
    }
    Ok(None)
}

fn compute_balances(conn: &Connection, kind_column: &str) -> Result<Backfill> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT account_id, {kind_column}, amount FROM transactions
             WHERE account_id IS NOT NULL ORDER BY id"
        ))
        .map_err(db_err("failed to prepare balance query"))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })
        .map_err(db_err("failed to query transactions"))?;

    let mut backfill = Backfill::default();
    for row in rows {
        let (account_id, label, amount) = row.map_err(db_err("failed to read transaction row"))?;
        // Old rows stored expenses both signed and unsigned; the label decides the sign.
        let amount = amount.unwrap_or(0.0).abs();
        let effect = label.as_deref().and_then(balance_effect);

        let delta = match effect {
            Some(BalanceEffect::Credit) => amount,
            Some(BalanceEffect::Debit) => -amount,
            Some(BalanceEffect::Neutral) => 0.0,
            None => {
                let label = label.unwrap_or_else(|| "<null>".to_string());
                *backfill.unmapped.entry(label).or_default() += 1;
                0.0
            }
        };
        *backfill.balances.entry(account_id).or_default() += delta;
    }
    Ok(backfill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::test_support::{apply, memory};

    fn balance(conn: &Connection, account_id: i64) -> f64 {
        conn.query_row(
            "SELECT balance FROM accounts WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn legacy_db() -> Connection {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY, user_id INTEGER, name TEXT);
             CREATE TABLE transactions (
                 id INTEGER PRIMARY KEY, account_id INTEGER, amount REAL, type TEXT
             );
             INSERT INTO accounts (id, user_id, name) VALUES (1, 1, 'Checking'), (2, 1, 'Savings'), (3, 1, 'Empty');
             INSERT INTO transactions (account_id, amount, type) VALUES
                 (1, 1000.0, 'income'),
                 (1, 250.5, 'expense'),
                 (1, 100.0, 'despesa'),
                 (1, 40.0, 'transfer_out'),
                 (1, 75.0, 'refund'),
                 (2, 40.0, 'transfer_in'),
                 (2, 500.0, 'Receita'),
                 (2, 10.0, 'transfer');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn maps_labels_to_effects() {
        assert_eq!(balance_effect("income"), Some(BalanceEffect::Credit));
        assert_eq!(balance_effect("saida"), Some(BalanceEffect::Debit));
        assert_eq!(balance_effect("TRANSFER_IN"), Some(BalanceEffect::Credit));
        assert_eq!(balance_effect("transfer_out"), Some(BalanceEffect::Debit));
        assert_eq!(balance_effect("transferencia"), Some(BalanceEffect::Neutral));
        assert_eq!(balance_effect("refund"), None);
    }

    #[test]
    fn backfills_from_legacy_type_column() {
        let conn = legacy_db();
        apply(&conn, up);

        assert!((balance(&conn, 1) - 609.5).abs() < 1e-9);
        assert!((balance(&conn, 2) - 540.0).abs() < 1e-9);
        assert_eq!(balance(&conn, 3), 0.0);
    }

    #[test]
    fn prefers_transaction_type_column() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE transactions (
                 id INTEGER PRIMARY KEY, account_id INTEGER, amount REAL,
                 type TEXT, transaction_type TEXT
             );
             INSERT INTO accounts (id, name) VALUES (1, 'Main');
             INSERT INTO transactions (account_id, amount, type, transaction_type)
                 VALUES (1, 30.0, 'expense', 'receita');",
        )
        .unwrap();

        apply(&conn, up);
        assert_eq!(balance(&conn, 1), 30.0);
    }

    #[test]
    fn existing_balance_column_is_left_alone() {
        let conn = legacy_db();
        conn.execute_batch(
            "ALTER TABLE accounts ADD COLUMN balance REAL DEFAULT 0;
             UPDATE accounts SET balance = 12.0;",
        )
        .unwrap();

        apply(&conn, up);
        assert_eq!(balance(&conn, 1), 12.0);
    }

    #[test]
    fn accounts_without_history_default_to_zero() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO accounts (id, name) VALUES (7, 'Wallet');",
        )
        .unwrap();

        apply(&conn, up);
        assert_eq!(balance(&conn, 7), 0.0);
    }

    #[test]
    fn collects_unmapped_labels() {
        let conn = legacy_db();
        let backfill = compute_balances(&conn, "type").unwrap();
        assert_eq!(backfill.unmapped.get("refund"), Some(&1));
        assert_eq!(backfill.unmapped.len(), 1);
    }
}

use fynanpro_common::{Result, TransactionKind};
use rusqlite::Connection;
use tracing::{info, warn};

use super::drop_legacy_column;
use super::normalize::{normalize_labels, transaction_mappings, warn_unmapped};
use crate::db_err;
use crate::probe::SchemaProbe;

/// Make `transactions.transaction_type` the only kind column and rewrite
/// its values into the canonical vocabulary.
pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    if !probe.table_exists("transactions")? {
        warn!("transactions table missing, skipping kind column fix");
        return Ok(());
    }

    let has_legacy = probe.column_exists("transactions", "type")?;
    let has_current = probe.column_exists("transactions", "transaction_type")?;

    if !has_current {
        conn.execute_batch("ALTER TABLE transactions ADD COLUMN transaction_type TEXT;")
            .map_err(db_err("failed to add transactions.transaction_type"))?;
        info!("added transactions.transaction_type");
    }

    if has_legacy {
        let copied = conn
            .execute(
                "UPDATE transactions SET transaction_type = type
                 WHERE (transaction_type IS NULL OR TRIM(transaction_type) = '')
                   AND type IS NOT NULL",
                [],
            )
            .map_err(db_err("failed to copy legacy transaction kinds"))?;
        info!("{copied} transaction kinds copied from legacy column");
    }

    // Rows that never carried a kind get one from the sign of the amount.
    let derived = conn
        .execute(
            &format!(
                "UPDATE transactions
                 SET transaction_type = CASE WHEN amount >= 0 THEN '{}' ELSE '{}' END
                 WHERE transaction_type IS NULL OR TRIM(transaction_type) = ''",
                TransactionKind::from_amount_sign(1.0).as_str(),
                TransactionKind::from_amount_sign(-1.0).as_str(),
            ),
            [],
        )
        .map_err(db_err("failed to derive transaction kinds"))?;
    if derived > 0 {
        info!("{derived} transaction kinds derived from amount sign");
    }

    let mappings = transaction_mappings();
    let normalized = normalize_labels(conn, "transactions", "transaction_type", &mappings)?;
    if normalized == 0 {
        info!("transaction kinds already canonical");
    }
    warn_unmapped(conn, "transactions", "transaction_type", &mappings)?;

    if has_legacy {
        drop_legacy_column(conn, "transactions", "type")?;
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(transaction_type);",
    )
    .map_err(db_err("failed to index transactions.transaction_type"))?;
    Ok(())
}

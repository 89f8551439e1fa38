//! Rewriting legacy kind labels into the canonical vocabulary.

use fynanpro_common::{CategoryKind, Result, TransactionKind};
use rusqlite::{Connection, params};
use tracing::{info, warn};

use super::sql_string_list;
use crate::db_err;

/// A canonical label and the labels that normalize to it.
pub(crate) struct LabelMapping {
    pub canonical: &'static str,
    pub legacy: &'static [&'static str],
}

pub(crate) fn transaction_mappings() -> Vec<LabelMapping> {
    TransactionKind::ALL
        .iter()
        .map(|kind| LabelMapping {
            canonical: kind.as_str(),
            legacy: kind.legacy_labels(),
        })
        .collect()
}

pub(crate) fn category_mappings() -> Vec<LabelMapping> {
    CategoryKind::ALL
        .iter()
        .map(|kind| LabelMapping {
            canonical: kind.as_str(),
            legacy: kind.legacy_labels(),
        })
        .collect()
}

/// Rewrite every value of `table.column` that matches a mapping (ignoring
/// case and surrounding whitespace) to its canonical label. Returns the
/// number of rows changed.
pub(crate) fn normalize_labels(
    conn: &Connection,
    table: &str,
    column: &str,
    mappings: &[LabelMapping],
) -> Result<usize> {
    let mut total = 0;
    for mapping in mappings {
        let mut labels = vec![mapping.canonical];
        labels.extend_from_slice(mapping.legacy);

        let changed = conn
            .execute(
                &format!(
                    "UPDATE {table} SET {column} = ?1
                     WHERE LOWER(TRIM({column})) IN ({}) AND {column} <> ?1",
                    sql_string_list(&labels)
                ),
                params![mapping.canonical],
            )
            .map_err(db_err("failed to normalize labels"))?;

        if changed > 0 {
            info!("{changed} rows in {table} normalized to '{}'", mapping.canonical);
        }
        total += changed;
    }
    Ok(total)
}

/// Values of `table.column` outside the canonical vocabulary, with row
/// counts. NULL is reported as `None`.
pub(crate) fn unmapped_labels(
    conn: &Connection,
    table: &str,
    column: &str,
    mappings: &[LabelMapping],
) -> Result<Vec<(Option<String>, i64)>> {
    let canonical: Vec<&str> = mappings.iter().map(|m| m.canonical).collect();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {column}, COUNT(*) FROM {table}
             WHERE {column} IS NULL OR {column} NOT IN ({})
             GROUP BY {column} ORDER BY {column}",
            sql_string_list(&canonical)
        ))
        .map_err(db_err("failed to prepare unmapped label query"))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(db_err("failed to query unmapped labels"))?;

    let mut unmapped = Vec::new();
    for row in rows {
        unmapped.push(row.map_err(db_err("failed to read unmapped label row"))?);
    }
    Ok(unmapped)
}

/// Log leftover labels. They stay as they are; this is not an error.
pub(crate) fn warn_unmapped(
    conn: &Connection,
    table: &str,
    column: &str,
    mappings: &[LabelMapping],
) -> Result<()> {
    for (label, rows) in unmapped_labels(conn, table, column, mappings)? {
        let label = label.as_deref().unwrap_or("<null>");
        warn!("{rows} rows in {table} keep unmapped {column} '{label}'");
    }
    Ok(())
}

use fynanpro_common::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::db_err;

/// Inspects the current shape of the schema so a migration can decide
/// whether it has anything to do.
pub trait SchemaProbe {
    fn table_exists(&self, table: &str) -> Result<bool>;
    fn column_exists(&self, table: &str, column: &str) -> Result<bool>;
}

/// `SchemaProbe` backed by `sqlite_master` and `pragma_table_info`.
pub struct SqliteProbe<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteProbe<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn index_exists(&self, index: &str) -> Result<bool> {
        self.master_entry_exists("index", index)
    }

    /// Column names of `table` in declaration order. Empty if the table does
    /// not exist.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(db_err("failed to prepare table_info query"))?;
        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(db_err("failed to read table_info"))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.map_err(db_err("failed to read table_info row"))?);
        }
        Ok(columns)
    }

    /// Explicitly created indexes on `table` that cover `column`.
    pub fn indexes_on_column(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT il.name
                 FROM pragma_index_list(?1) AS il, pragma_index_info(il.name) AS ii
                 WHERE il.origin = 'c' AND ii.name = ?2
                 ORDER BY il.name",
            )
            .map_err(db_err("failed to prepare index_list query"))?;
        let rows = stmt
            .query_map(params![table, column], |row| row.get::<_, String>(0))
            .map_err(db_err("failed to read index_list"))?;

        let mut indexes = Vec::new();
        for row in rows {
            indexes.push(row.map_err(db_err("failed to read index_list row"))?);
        }
        Ok(indexes)
    }

    /// Whether `table.column` is declared NOT NULL. False if the column does
    /// not exist.
    pub fn column_not_null(&self, table: &str, column: &str) -> Result<bool> {
        let not_null = self
            .conn
            .query_row(
                "SELECT \"notnull\" FROM pragma_table_info(?1) WHERE name = ?2",
                params![table, column],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db_err("failed to query table_info"))?;
        Ok(not_null.is_some_and(|flag| flag != 0))
    }

    fn master_entry_exists(&self, kind: &str, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
                params![kind, name],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err("failed to query sqlite_master"))?;
        Ok(found.is_some())
    }
}

impl SchemaProbe for SqliteProbe<'_> {
    fn table_exists(&self, table: &str) -> Result<bool> {
        self.master_entry_exists("table", table)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
                params![table, column],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err("failed to query table_info"))?;
        Ok(found.is_some())
    }
}

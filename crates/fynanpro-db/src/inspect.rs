//! Read-only description of the current schema, for operators.

use fynanpro_common::Result;
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::db_err;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub rows: i64,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// Every user table (SQLite's internal tables excluded), sorted by name.
pub fn describe(conn: &Connection) -> Result<Vec<TableInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(db_err("failed to list tables"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(db_err("failed to list tables"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("failed to read table name"))?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns = describe_columns(conn, &name)?;
        let rows = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{name}\""), [], |row| row.get(0))
            .map_err(db_err("failed to count rows"))?;
        tables.push(TableInfo {
            name,
            rows,
            columns,
        });
    }
    Ok(tables)
}

fn describe_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk
             FROM pragma_table_info(?1) ORDER BY cid",
        )
        .map_err(db_err("failed to prepare column query"))?;

    let columns = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                default: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? != 0,
            })
        })
        .map_err(db_err("failed to query columns"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("failed to read column row"))?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_tables_and_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE accounts (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 name TEXT NOT NULL,
                 balance REAL NOT NULL DEFAULT 0
             );
             INSERT INTO accounts (name) VALUES ('Checking'), ('Savings');
             CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);",
        )
        .unwrap();

        let tables = describe(&conn).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        // AUTOINCREMENT creates sqlite_sequence, which is hidden.
        assert_eq!(names, vec!["accounts", "users"]);

        let accounts = &tables[0];
        assert_eq!(accounts.rows, 2);
        assert_eq!(accounts.columns.len(), 3);
        assert!(accounts.columns[0].primary_key);
        let balance = &accounts.columns[2];
        assert_eq!(balance.decl_type, "REAL");
        assert!(balance.not_null);
        assert_eq!(balance.default.as_deref(), Some("0"));
    }
}

use fynanpro_common::Result;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use super::drop_legacy_column;
use super::m000_base_schema::CATEGORIES_TABLE;
use super::normalize::{category_mappings, normalize_labels, warn_unmapped};
use crate::db_err;
use crate::probe::{SchemaProbe, SqliteProbe};

/// Columns a categories table from an older release may be missing.
const OPTIONAL_COLUMNS: [(&str, &str); 4] = [
    ("user_id", "INTEGER"),
    ("description", "TEXT"),
    ("icon", "TEXT"),
    ("parent_id", "INTEGER"),
];

/// Target of a rebuild. `category_type` carries no CHECK so labels outside
/// the mapping survive the copy, as they do on tables upgraded in place.
const REBUILT_CATEGORIES_TABLE: &str = "CREATE TABLE categories_rebuilt (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    category_type TEXT,
    description TEXT,
    icon TEXT,
    parent_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

/// Bring `categories` to its current shape: `category_type` with canonical
/// labels, plus the descriptive columns the seed rows use.
pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    if !probe.table_exists("categories")? {
        conn.execute_batch(CATEGORIES_TABLE)
            .map_err(db_err("failed to create categories"))?;
        info!("created categories table");
        return Ok(());
    }

    let has_legacy = probe.column_exists("categories", "type")?;
    if !probe.column_exists("categories", "category_type")? {
        conn.execute_batch("ALTER TABLE categories ADD COLUMN category_type TEXT;")
            .map_err(db_err("failed to add categories.category_type"))?;
        info!("added categories.category_type");
    }

    if has_legacy {
        let copied = conn
            .execute(
                "UPDATE categories SET category_type = type
                 WHERE (category_type IS NULL OR TRIM(category_type) = '')
                   AND type IS NOT NULL",
                [],
            )
            .map_err(db_err("failed to copy legacy category kinds"))?;
        info!("{copied} category kinds copied from legacy column");
    }

    let mappings = category_mappings();
    normalize_labels(conn, "categories", "category_type", &mappings)?;
    warn_unmapped(conn, "categories", "category_type", &mappings)?;

    if has_legacy {
        drop_legacy_column(conn, "categories", "type")?;
    }

    for (column, decl) in OPTIONAL_COLUMNS {
        if !probe.column_exists("categories", column)? {
            conn.execute_batch(&format!("ALTER TABLE categories ADD COLUMN {column} {decl};"))
                .map_err(db_err("failed to add category column"))?;
            info!("added categories.{column}");
        }
    }

    // System categories have no owner; older tables required one.
    if SqliteProbe::new(conn).column_not_null("categories", "user_id")? {
        rebuild_with_optional_owner(conn)?;
    }
    Ok(())
}

/// Recreate `categories` with a nullable `user_id`, keeping every row, every
/// extra legacy column, and every explicitly created index. Expects foreign
/// keys to be off so dropping the old table does not cascade.
fn rebuild_with_optional_owner(conn: &Connection) -> Result<()> {
    let index_sql = index_definitions(conn, "categories")?;

    conn.execute_batch(REBUILT_CATEGORIES_TABLE)
        .map_err(db_err("failed to create rebuilt categories table"))?;
    let probe = SqliteProbe::new(conn);
    let legacy_columns = column_definitions(conn, "categories")?;
    for column in &legacy_columns {
        if probe.column_exists("categories_rebuilt", &column.name)? {
            continue;
        }
        let default = column
            .default
            .as_deref()
            .filter(|d| is_constant_default(d))
            .map(|d| format!(" DEFAULT {d}"))
            .unwrap_or_default();
        conn.execute_batch(&format!(
            "ALTER TABLE categories_rebuilt ADD COLUMN \"{}\" {}{default};",
            column.name, column.decl_type
        ))
        .map_err(db_err("failed to carry legacy category column"))?;
        debug!("kept legacy column categories.{}", column.name);
    }

    let names = legacy_columns
        .iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let copied = conn
        .execute(
            &format!("INSERT INTO categories_rebuilt ({names}) SELECT {names} FROM categories"),
            [],
        )
        .map_err(db_err("failed to copy categories"))?;

    conn.execute_batch(
        "DROP TABLE categories;
         ALTER TABLE categories_rebuilt RENAME TO categories;",
    )
    .map_err(db_err("failed to swap rebuilt categories table"))?;
    for sql in &index_sql {
        conn.execute_batch(sql)
            .map_err(db_err("failed to recreate category index"))?;
    }

    info!("rebuilt categories with optional user_id ({copied} rows kept)");
    Ok(())
}

struct ColumnDefinition {
    name: String,
    decl_type: String,
    default: Option<String>,
}

fn column_definitions(conn: &Connection, table: &str) -> Result<Vec<ColumnDefinition>> {
    let mut stmt = conn
        .prepare("SELECT name, type, dflt_value FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(db_err("failed to prepare table_info query"))?;
    let columns = stmt
        .query_map(params![table], |row| {
            Ok(ColumnDefinition {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                default: row.get(2)?,
            })
        })
        .map_err(db_err("failed to read table_info"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("failed to read table_info row"))?;
    Ok(columns)
}

fn index_definitions(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT sql FROM sqlite_master
             WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL
             ORDER BY name",
        )
        .map_err(db_err("failed to list category indexes"))?;
    let indexes = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))
        .map_err(db_err("failed to list category indexes"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("failed to read category index"))?;
    Ok(indexes)
}

/// ADD COLUMN only accepts literal defaults.
fn is_constant_default(default: &str) -> bool {
    let upper = default.trim().to_uppercase();
    !upper.starts_with("CURRENT_") && !upper.starts_with('(')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::test_support::{apply, columns, count, memory};

    #[test]
    fn creates_missing_table() {
        let conn = memory();
        apply(&conn, up);
        assert!(columns(&conn, "categories").contains(&"category_type".to_string()));
    }

    #[test]
    fn converts_legacy_english_type_column() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE categories (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 user_id INTEGER NULL,
                 name TEXT NOT NULL,
                 type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                 parent_id INTEGER NULL
             );
             INSERT INTO categories (name, type) VALUES
                 ('Salário', 'income'), ('Moradia', 'expense'), ('Lazer', 'expense');",
        )
        .unwrap();

        apply(&conn, up);

        let cols = columns(&conn, "categories");
        assert!(!cols.contains(&"type".to_string()));
        assert!(cols.contains(&"description".to_string()));
        assert!(cols.contains(&"icon".to_string()));
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM categories WHERE category_type = 'despesa'"),
            2
        );
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM categories WHERE category_type NOT IN ('receita', 'despesa')"
            ),
            0
        );
    }

    #[test]
    fn current_shape_is_left_alone() {
        let conn = memory();
        // As during a real run, where the runner turns foreign keys off.
        conn.execute_batch("PRAGMA foreign_keys=OFF;").unwrap();
        conn.execute_batch(CATEGORIES_TABLE).unwrap();
        conn.execute(
            "INSERT INTO categories (name, category_type) VALUES ('Vendas', 'receita')",
            [],
        )
        .unwrap();
        let before = columns(&conn, "categories");

        apply(&conn, up);

        assert_eq!(columns(&conn, "categories"), before);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM categories"), 1);
    }

    #[test]
    fn rebuilds_table_with_required_owner() {
        let conn = memory();
        // As during a real run, where the runner turns foreign keys off.
        conn.execute_batch("PRAGMA foreign_keys=OFF;").unwrap();
        conn.execute_batch(
            "CREATE TABLE categories (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 user_id INTEGER NOT NULL,
                 name VARCHAR(100) NOT NULL,
                 type TEXT NOT NULL,
                 color VARCHAR(7) DEFAULT '#007bff',
                 icon VARCHAR(50) DEFAULT 'fa-money-bill',
                 is_active BOOLEAN DEFAULT 1,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );
             CREATE INDEX idx_categories_owner ON categories(user_id);
             INSERT INTO categories (id, user_id, name, type, color) VALUES
                 (7, 1, 'Mercado', 'expense', '#ff0000');",
        )
        .unwrap();

        apply(&conn, up);

        let probe = SqliteProbe::new(&conn);
        assert!(!probe.column_not_null("categories", "user_id").unwrap());
        assert!(probe.index_exists("idx_categories_owner").unwrap());
        assert!(!probe.table_exists("categories_rebuilt").unwrap());
        let cols = columns(&conn, "categories");
        assert!(cols.contains(&"color".to_string()));
        assert!(!cols.contains(&"type".to_string()));

        let (kind, color): (String, String) = conn
            .query_row(
                "SELECT category_type, color FROM categories WHERE id = 7",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(kind, "despesa");
        assert_eq!(color, "#ff0000");

        conn.execute(
            "INSERT INTO categories (user_id, name, category_type) VALUES (NULL, 'Lazer', 'despesa')",
            [],
        )
        .unwrap();
        let color: String = conn
            .query_row(
                "SELECT color FROM categories WHERE name = 'Lazer'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(color, "#007bff");
    }
}

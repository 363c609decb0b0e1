//! SQLite warehouse implementation.
//!
//! File-backed databases are opened read-only, and every statement is checked with
//! `sqlite3_stmt_readonly` before it runs, so writes are refused by the engine itself
//! regardless of what the SQL guard decided.

use super::{Cell, DryRunReport, FieldMode, FieldSchema, QueryResult, Row, TableKind, TableSchema, Warehouse};
use crate::error::{GalleryError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// SQLite-based warehouse.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    /// Open an existing database file in read-only mode.
    #[instrument(skip_all)]
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GalleryError::Config(format!(
                "SQLite warehouse not found at {:?}",
                path
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        info!("Opened SQLite warehouse at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Wrap an already open connection (useful for testing).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GalleryError::Warehouse(format!("Failed to acquire lock: {}", e)))
    }

    fn run_query(conn: &Connection, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(GalleryError::Warehouse(
                "Statement would modify the database".to_string(),
            ));
        }

        let columns: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().map(str::to_uppercase)))
            .collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            if out.len() >= max_rows {
                break;
            }
            let mut values = Vec::with_capacity(columns.len());
            for (idx, (name, decl_type)) in columns.iter().enumerate() {
                let value: SqlValue = row.get(idx)?;
                values.push((name.clone(), decode_value(value, decl_type.as_deref())));
            }
            out.push(Row { values });
        }

        Ok(QueryResult {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows: out,
        })
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn qualified_name(&self, table: &str) -> String {
        table.to_string()
    }

    #[instrument(skip(self, sql))]
    async fn dry_run(&self, sql: &str) -> Result<DryRunReport> {
        let conn = self.lock()?;
        let stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(GalleryError::Warehouse(
                "Statement would modify the database".to_string(),
            ));
        }
        debug!("Dry run succeeded");
        Ok(DryRunReport::default())
    }

    #[instrument(skip(self, sql))]
    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let conn = self.lock()?;
        let result = Self::run_query(&conn, sql, max_rows)?;
        debug!("Query returned {} rows", result.rows.len());
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let entries = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = Vec::with_capacity(entries.len());
        for (name, kind) in entries {
            let mut info = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(&name)))?;
            let fields = info
                .query_map([], |row| {
                    let column: String = row.get(1)?;
                    let declared: String = row.get(2)?;
                    let not_null: i64 = row.get(3)?;
                    let field_type = if declared.is_empty() {
                        "ANY".to_string()
                    } else {
                        declared.to_uppercase()
                    };
                    let mode = if not_null != 0 {
                        FieldMode::Required
                    } else {
                        FieldMode::Nullable
                    };
                    Ok(FieldSchema::new(&column, &field_type).with_mode(mode))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            tables.push(TableSchema {
                name,
                kind: match kind.as_str() {
                    "table" => TableKind::Table,
                    "view" => TableKind::View,
                    _ => TableKind::Other,
                },
                fields,
            });
        }

        info!("Found {} tables and views", tables.len());
        Ok(tables)
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<QueryResult> {
        let conn = self.lock()?;
        let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), limit);
        Self::run_query(&conn, &sql, limit)
    }
}

/// Quote an identifier for SQLite.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a raw SQLite value using the column's declared type.
fn decode_value(value: SqlValue, decl_type: Option<&str>) -> Cell {
    let decl_type = decl_type.unwrap_or("");
    match value {
        SqlValue::Null => Cell::Null,
        SqlValue::Integer(i) if decl_type.starts_with("BOOL") => Cell::Bool(i != 0),
        SqlValue::Integer(i) => Cell::Int(i),
        SqlValue::Real(f) => Cell::Float(f),
        SqlValue::Text(s) => {
            if decl_type.contains("DATETIME") || decl_type.contains("TIMESTAMP") {
                parse_datetime(&s).map(Cell::DateTime).unwrap_or(Cell::Text(s))
            } else if decl_type.contains("DATE") {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map(Cell::Date)
                    .unwrap_or(Cell::Text(s))
            } else {
                Cell::Text(s)
            }
        }
        SqlValue::Blob(bytes) => Cell::Text(format!("<{} bytes>", bytes.len())),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory warehouse with a small sales dataset.
    pub(crate) fn sales_warehouse() -> SqliteWarehouse {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE stores (
                store_id INTEGER NOT NULL,
                city TEXT,
                opened DATE,
                is_open BOOLEAN
            );
            CREATE TABLE sales (
                store_id INTEGER NOT NULL,
                sold_at DATETIME,
                units INTEGER,
                revenue REAL
            );
            CREATE VIEW busy_stores AS SELECT store_id FROM sales WHERE units > 10;

            INSERT INTO stores VALUES (1, 'Oslo', '2021-04-01', 1);
            INSERT INTO stores VALUES (2, 'Bergen', '2022-09-15', 0);
            INSERT INTO sales VALUES (1, '2025-01-03 09:30:00', 12, 240.5);
            INSERT INTO sales VALUES (2, '2025-01-04 17:00:00', 3, 60.0);
            "#,
        )
        .unwrap();
        SqliteWarehouse::from_connection(conn)
    }

    #[tokio::test]
    async fn test_query_decodes_declared_types() {
        let warehouse = sales_warehouse();
        let result = warehouse
            .query("SELECT store_id, city, opened, is_open FROM stores ORDER BY store_id", 80)
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["store_id", "city", "opened", "is_open"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(
            result.rows[0].get("opened"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2021, 4, 1).unwrap()))
        );
        assert_eq!(result.rows[1].get("is_open"), Some(&Cell::Bool(false)));
    }

    #[tokio::test]
    async fn test_query_respects_max_rows() {
        let warehouse = sales_warehouse();
        let result = warehouse.query("SELECT * FROM sales", 1).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert!(matches!(result.rows[0].get("sold_at"), Some(Cell::DateTime(_))));
    }

    #[tokio::test]
    async fn test_writes_are_refused() {
        let warehouse = sales_warehouse();
        assert!(warehouse.query("DELETE FROM sales", 80).await.is_err());
        assert!(warehouse.dry_run("DROP TABLE sales").await.is_err());

        let remaining = warehouse.query("SELECT COUNT(*) AS n FROM sales", 80).await.unwrap();
        assert_eq!(remaining.rows[0].get("n"), Some(&Cell::Int(2)));
    }

    #[tokio::test]
    async fn test_dry_run_reports_errors() {
        let warehouse = sales_warehouse();
        assert!(warehouse.dry_run("SELECT city FROM stores").await.is_ok());
        assert!(warehouse.dry_run("SELECT nope FROM stores").await.is_err());
    }

    #[tokio::test]
    async fn test_list_tables() {
        let warehouse = sales_warehouse();
        let tables = warehouse.list_tables().await.unwrap();

        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["busy_stores", "sales", "stores"]);
        assert_eq!(tables[0].kind, TableKind::View);

        let stores = &tables[2];
        assert_eq!(stores.fields[0].name, "store_id");
        assert_eq!(stores.fields[0].mode, FieldMode::Required);
        assert_eq!(stores.fields[2].field_type, "DATE");
    }

    #[tokio::test]
    async fn test_sample_rows() {
        let warehouse = sales_warehouse();
        let sample = warehouse.sample_rows("stores", 1).await.unwrap();
        assert_eq!(sample.rows.len(), 1);
        assert_eq!(sample.columns.len(), 4);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = SqliteWarehouse::open_read_only(Path::new("/nonexistent/warehouse.db"));
        assert!(matches!(result, Err(GalleryError::Config(_))));
    }
}

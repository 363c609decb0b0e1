//! Data warehouse abstraction.
//!
//! Provides a trait-based interface over the warehouses the SQL agent can query:
//! BigQuery through its REST API and local SQLite files.

mod bigquery;
mod sqlite;

pub use bigquery::BigQueryWarehouse;
pub use sqlite::SqliteWarehouse;

#[cfg(test)]
pub(crate) use sqlite::tests::sales_warehouse;

use crate::config::{Settings, WarehouseBackend};
use crate::error::{GalleryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A single value returned by the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Array(Vec<Cell>),
    Record(Vec<(String, Cell)>),
}

impl Cell {
    /// Convert to JSON. Date-like values become fixed-format strings.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Cell::DateTime(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::Timestamp(ts) => Value::String(ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            Cell::Array(items) => Value::Array(items.iter().map(Cell::to_json).collect()),
            Cell::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, cell)| (name.clone(), cell.to_json()))
                    .collect(),
            ),
        }
    }

    /// Render as a SQL literal for example rows.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Null => "NULL".to_string(),
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Cell::Date(_) | Cell::DateTime(_) | Cell::Timestamp(_) => match self.to_json() {
                Value::String(s) => format!("'{}'", s),
                other => other.to_string(),
            },
            Cell::Array(items) => format!(
                "[{}]",
                items.iter().map(Cell::to_sql_literal).collect::<Vec<_>>().join(", ")
            ),
            Cell::Record(fields) => format!(
                "({})",
                fields
                    .iter()
                    .map(|(_, cell)| cell.to_sql_literal())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// One result row, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<(String, Cell)>,
}

impl Row {
    /// Convert to a JSON object with all date-like cells stringified.
    pub fn to_json(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect()
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }
}

/// Rows returned by a query along with its column names.
///
/// Statements without a result schema have no columns.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Outcome of a dry run.
#[derive(Debug, Clone, Default)]
pub struct DryRunReport {
    /// Bytes the query would scan, when the warehouse reports it.
    pub bytes_processed: Option<u64>,
}

/// Field mode, as reported by the warehouse schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// A column (or nested field) definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    /// Warehouse type name, e.g. `STRING`, `INTEGER`, `RECORD`.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: FieldMode,
    #[serde(default)]
    pub description: Option<String>,
    /// Nested fields of a `RECORD`/`STRUCT`.
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    /// A nullable field without description.
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: FieldMode::Nullable,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldSchema>) -> Self {
        self.fields = fields;
        self
    }
}

/// Kind of relation in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Table,
    View,
    Other,
}

/// Schema of one table or view.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub kind: TableKind,
    pub fields: Vec<FieldSchema>,
}

/// Trait for warehouse implementations.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Project that owns the dataset, if the backend has one.
    fn project_id(&self) -> Option<&str> {
        None
    }

    /// Dataset exposed to the agent, if the backend has one.
    fn dataset_id(&self) -> Option<&str> {
        None
    }

    /// Name to use when referencing `table` in generated SQL.
    fn qualified_name(&self, table: &str) -> String;

    /// Check a query without executing it.
    async fn dry_run(&self, sql: &str) -> Result<DryRunReport>;

    /// Execute a query, keeping at most `max_rows` rows.
    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryResult>;

    /// List tables and views with their schemas.
    async fn list_tables(&self) -> Result<Vec<TableSchema>>;

    /// Read up to `limit` rows from a table.
    async fn sample_rows(&self, table: &str, limit: usize) -> Result<QueryResult>;
}

/// Build the warehouse selected in the settings.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn Warehouse>> {
    match settings.warehouse.backend {
        WarehouseBackend::Bigquery => {
            let project = settings.warehouse.project_id.clone().ok_or_else(|| {
                GalleryError::Config(
                    "warehouse.project_id is not set (or set GOOGLE_CLOUD_PROJECT)".to_string(),
                )
            })?;
            let dataset = settings.warehouse.dataset_id.clone().ok_or_else(|| {
                GalleryError::Config(
                    "warehouse.dataset_id is not set (or set BQ_DATASET_ID)".to_string(),
                )
            })?;
            let token = bigquery::resolve_access_token(&settings.warehouse.access_token_env).await?;
            let warehouse = BigQueryWarehouse::new(project, dataset, token)
                .with_location(settings.warehouse.location.clone());
            Ok(Arc::new(warehouse))
        }
        WarehouseBackend::Sqlite => {
            let warehouse = SqliteWarehouse::open_read_only(&settings.sqlite_path())?;
            Ok(Arc::new(warehouse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_cells_are_stringified() {
        let row = Row {
            values: vec![
                ("day".to_string(), Cell::Date(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap())),
                (
                    "seen_at".to_string(),
                    Cell::DateTime(
                        NaiveDate::from_ymd_opt(2025, 3, 9)
                            .unwrap()
                            .and_hms_opt(14, 5, 0)
                            .unwrap(),
                    ),
                ),
                ("units".to_string(), Cell::Int(12)),
                ("dates".to_string(), Cell::Array(vec![Cell::Date(
                    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                )])),
            ],
        };

        let json = Value::Object(row.to_json());
        assert_eq!(
            json,
            json!({
                "day": "2025-03-09",
                "seen_at": "2025-03-09 14:05:00",
                "units": 12,
                "dates": ["2024-12-31"],
            })
        );
        // Display never fails once stringified
        assert!(json.to_string().contains("2025-03-09"));
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(Cell::Null.to_sql_literal(), "NULL");
        assert_eq!(Cell::Text("O'Hare".to_string()).to_sql_literal(), "'O\\'Hare'");
        assert_eq!(Cell::Text(r"C:\data\".to_string()).to_sql_literal(), r"'C:\\data\\'");
        assert_eq!(Cell::Text(r"it\'s".to_string()).to_sql_literal(), r"'it\\\'s'");
        assert_eq!(Cell::Bool(true).to_sql_literal(), "TRUE");
        assert_eq!(
            Cell::Array(vec![Cell::Int(1), Cell::Int(2)]).to_sql_literal(),
            "[1, 2]"
        );
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()).to_sql_literal(),
            "'2025-01-02'"
        );
    }

    #[test]
    fn test_field_schema_deserializes_bigquery_json() {
        let field: FieldSchema = serde_json::from_value(json!({
            "name": "tags",
            "type": "STRING",
            "mode": "REPEATED",
            "description": "Free-form labels"
        }))
        .unwrap();
        assert_eq!(field.mode, FieldMode::Repeated);
        assert_eq!(field.description.as_deref(), Some("Free-form labels"));
        assert!(field.fields.is_empty());
    }
}

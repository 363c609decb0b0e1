//! DDL generation from the live warehouse schema.

use super::DATABASE_SETTINGS_KEY;
use crate::error::Result;
use crate::session::SessionState;
use crate::warehouse::{FieldMode, FieldSchema, QueryResult, TableKind, TableSchema, Warehouse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

/// Database settings exposed to the SQL agent through the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSettings {
    pub project_id: Option<String>,
    pub dataset_id: Option<String>,
    pub ddl_schema: String,
}

/// Render `CREATE OR REPLACE TABLE` statements plus example rows for every table.
///
/// Views are skipped.
#[instrument(skip(warehouse), fields(warehouse = warehouse.name()))]
pub async fn generate_ddl(warehouse: &dyn Warehouse, sample_rows: usize) -> Result<String> {
    let tables = warehouse.list_tables().await?;
    let mut ddl = String::new();
    let mut rendered = 0;

    for table in tables.iter().filter(|t| t.kind == TableKind::Table) {
        let sample = if sample_rows > 0 {
            Some(warehouse.sample_rows(&table.name, sample_rows).await?)
        } else {
            None
        };
        let qualified = warehouse.qualified_name(&table.name);
        ddl.push_str(&render_table_ddl(&qualified, table, sample.as_ref()));
        ddl.push('\n');
        rendered += 1;
    }

    info!(
        "Generated DDL for {} tables ({} skipped)",
        rendered,
        tables.len() - rendered
    );
    Ok(ddl)
}

/// Render one table definition followed by its example rows.
pub fn render_table_ddl(qualified: &str, table: &TableSchema, sample: Option<&QueryResult>) -> String {
    let mut out = format!("CREATE OR REPLACE TABLE `{}` (\n", qualified);

    let last = table.fields.len().saturating_sub(1);
    for (idx, field) in table.fields.iter().enumerate() {
        out.push_str("  ");
        out.push_str(&field.name);
        out.push(' ');
        out.push_str(&column_type(field));
        if field.mode == FieldMode::Required {
            out.push_str(" NOT NULL");
        }
        if idx != last {
            out.push(',');
        }
        if let Some(description) = field.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(" -- ");
            out.push_str(&description.replace('\n', " "));
        }
        out.push('\n');
    }
    out.push_str(");\n");

    if let Some(sample) = sample.filter(|s| !s.rows.is_empty()) {
        out.push_str(&format!("-- Example values for `{}`\n", qualified));
        for row in &sample.rows {
            let values: Vec<String> = row.values.iter().map(|(_, cell)| cell.to_sql_literal()).collect();
            out.push_str(&format!(
                "INSERT INTO `{}` VALUES ({});\n",
                qualified,
                values.join(", ")
            ));
        }
    }

    out
}

/// Column type in GoogleSQL notation, including `ARRAY` and `STRUCT` wrappers.
fn column_type(field: &FieldSchema) -> String {
    let base = match field.field_type.to_uppercase().as_str() {
        "RECORD" | "STRUCT" => {
            let members: Vec<String> = field
                .fields
                .iter()
                .map(|f| format!("{} {}", f.name, column_type(f)))
                .collect();
            format!("STRUCT<{}>", members.join(", "))
        }
        "INTEGER" => "INT64".to_string(),
        "FLOAT" => "FLOAT64".to_string(),
        "BOOLEAN" => "BOOL".to_string(),
        other => other.to_string(),
    };

    if field.mode == FieldMode::Repeated {
        format!("ARRAY<{}>", base)
    } else {
        base
    }
}

/// Lazily computed schema description for one warehouse.
///
/// The DDL is generated on first use and shared afterwards; concurrent first callers
/// wait on the same computation.
pub struct SchemaCache {
    warehouse: Arc<dyn Warehouse>,
    sample_rows: usize,
    ddl: OnceCell<String>,
}

impl SchemaCache {
    pub fn new(warehouse: Arc<dyn Warehouse>, sample_rows: usize) -> Self {
        Self {
            warehouse,
            sample_rows,
            ddl: OnceCell::new(),
        }
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// The DDL schema, generating it on first call.
    pub async fn ddl(&self) -> Result<&str> {
        let ddl = self
            .ddl
            .get_or_try_init(|| generate_ddl(self.warehouse.as_ref(), self.sample_rows))
            .await?;
        Ok(ddl.as_str())
    }

    pub async fn database_settings(&self) -> Result<DatabaseSettings> {
        Ok(DatabaseSettings {
            project_id: self.warehouse.project_id().map(str::to_string),
            dataset_id: self.warehouse.dataset_id().map(str::to_string),
            ddl_schema: self.ddl().await?.to_string(),
        })
    }

    /// Store the database settings in the session unless already present.
    pub async fn load_into(&self, session: &mut SessionState) -> Result<()> {
        if session.contains(DATABASE_SETTINGS_KEY) {
            debug!("Database settings already loaded");
            return Ok(());
        }
        let settings = self.database_settings().await?;
        session.set_json(DATABASE_SETTINGS_KEY, &settings)
    }
}

//! SQL validation against the warehouse.

use super::guard::{self, GuardViolation};
use super::QUERY_RESULT_KEY;
use crate::session::SessionState;
use crate::warehouse::Warehouse;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Message returned for statements refused by the guard.
pub const DISALLOWED_MESSAGE: &str = "Invalid SQL: Contains disallowed DML/DDL operations.";

/// Message returned for statements that run but produce no result schema.
pub const NO_RESULTS_MESSAGE: &str = "Valid SQL. Query executed successfully (no results).";

/// Result of validating a query: rows or an error message, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Rows(Vec<Map<String, Value>>),
    Error(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Rows(_))
    }

    pub fn rows(&self) -> Option<&[Map<String, Value>]> {
        match self {
            ValidationOutcome::Rows(rows) => Some(rows),
            ValidationOutcome::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Rows(_) => None,
            ValidationOutcome::Error(message) => Some(message),
        }
    }
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    query_result: Option<&'a [Map<String, Value>]>,
    error_message: Option<&'a str>,
}

impl Serialize for ValidationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        OutcomeJson {
            query_result: self.rows(),
            error_message: self.error_message(),
        }
        .serialize(serializer)
    }
}

/// Validates candidate SQL by dry-running and executing it with a row cap.
pub struct SqlValidator {
    warehouse: Arc<dyn Warehouse>,
    max_rows: usize,
}

impl SqlValidator {
    pub fn new(warehouse: Arc<dyn Warehouse>, max_rows: usize) -> Self {
        Self { warehouse, max_rows }
    }

    /// Validate `sql`, storing returned rows in the session.
    ///
    /// Never fails: every problem is reported through `ValidationOutcome::Error`.
    #[instrument(skip(self, sql, session))]
    pub async fn validate(&self, sql: &str, session: &mut SessionState) -> ValidationOutcome {
        let sql = cleanup_sql(sql, self.max_rows);
        debug!("Validating: {}", sql);

        if let Err(violation) = guard::check_read_only(&sql) {
            warn!("Refused statement: {}", violation);
            return ValidationOutcome::Error(match violation {
                GuardViolation::DisallowedKeyword(_) => DISALLOWED_MESSAGE.to_string(),
                other => format!("Invalid SQL: {}", other),
            });
        }

        if let Err(e) = self.warehouse.dry_run(&sql).await {
            return ValidationOutcome::Error(format!("Invalid SQL: {}", warehouse_message(e)));
        }

        let result = match self.warehouse.query(&sql, self.max_rows).await {
            Ok(result) => result,
            Err(e) => {
                return ValidationOutcome::Error(format!("Invalid SQL: {}", warehouse_message(e)))
            }
        };

        if result.columns.is_empty() {
            return ValidationOutcome::Error(NO_RESULTS_MESSAGE.to_string());
        }

        let rows: Vec<Map<String, Value>> = result
            .rows
            .iter()
            .take(self.max_rows)
            .map(|row| row.to_json())
            .collect();

        info!("Query returned {} rows", rows.len());
        session.set(
            QUERY_RESULT_KEY,
            Value::Array(rows.iter().cloned().map(Value::Object).collect()),
        );
        ValidationOutcome::Rows(rows)
    }
}

/// Strip the error-kind prefix so the message reads as the warehouse wrote it.
fn warehouse_message(error: crate::error::GalleryError) -> String {
    match error {
        crate::error::GalleryError::Warehouse(message) => message,
        other => other.to_string(),
    }
}

/// Undo escaping artifacts from tool-call arguments and enforce a row limit.
pub fn cleanup_sql(sql: &str, max_rows: usize) -> String {
    let cleaned = sql
        .replace("\\\"", "\"")
        .replace("\\\n", "\n")
        .replace("\\'", "'")
        .replace("\\n", "\n");
    let cleaned = cleaned.trim().trim_end_matches(';').trim_end().to_string();

    if guard::contains_keyword(&cleaned, "LIMIT") {
        cleaned
    } else {
        // On its own line so a trailing line comment cannot swallow it
        format!("{}\nLIMIT {}", cleaned, max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::sales_warehouse;
    use serde_json::json;

    fn validator() -> SqlValidator {
        SqlValidator::new(Arc::new(sales_warehouse()), 80)
    }

    #[test]
    fn test_cleanup_appends_limit() {
        assert_eq!(cleanup_sql("SELECT * FROM sales", 80), "SELECT * FROM sales\nLIMIT 80");
        assert_eq!(cleanup_sql("SELECT * FROM sales;\n", 80), "SELECT * FROM sales\nLIMIT 80");
    }

    #[test]
    fn test_cleanup_limit_survives_trailing_comment() {
        for sql in ["SELECT * FROM sales -- all of them", "SELECT * FROM sales # every row"] {
            let cleaned = cleanup_sql(sql, 80);
            assert!(guard::contains_keyword(&cleaned, "LIMIT"), "{}", cleaned);
            assert!(cleaned.ends_with("\nLIMIT 80"));
        }
    }

    #[tokio::test]
    async fn test_query_ending_in_comment_executes() {
        let validator = SqlValidator::new(Arc::new(sales_warehouse()), 1);
        let mut session = SessionState::new();
        let outcome = validator
            .validate("SELECT store_id FROM stores -- every store", &mut session)
            .await;
        assert_eq!(outcome.rows().map(|rows| rows.len()), Some(1));
    }

    #[test]
    fn test_cleanup_preserves_existing_limit() {
        assert_eq!(
            cleanup_sql("SELECT * FROM sales limit 5", 80),
            "SELECT * FROM sales limit 5"
        );
    }

    #[test]
    fn test_cleanup_unescapes() {
        assert_eq!(
            cleanup_sql(r#"SELECT \"a\" FROM t WHERE x = \'y\'\nLIMIT 1"#, 80),
            "SELECT \"a\" FROM t WHERE x = 'y'\nLIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_disallowed_statements_return_only_error() {
        let validator = validator();
        let mut session = SessionState::new();

        for sql in ["DROP TABLE sales", "delete from sales", "SELECT 1; Drop Table sales"] {
            let outcome = validator.validate(sql, &mut session).await;
            assert!(outcome.rows().is_none());
            assert!(outcome.error_message().is_some(), "expected error for {sql}");
        }

        let outcome = validator.validate("DELETE FROM sales", &mut session).await;
        assert_eq!(outcome, ValidationOutcome::Error(DISALLOWED_MESSAGE.to_string()));
        assert!(!session.contains(QUERY_RESULT_KEY));
    }

    #[tokio::test]
    async fn test_valid_query_returns_stringified_rows() {
        let validator = validator();
        let mut session = SessionState::new();

        let outcome = validator
            .validate("SELECT city, opened FROM stores ORDER BY store_id", &mut session)
            .await;

        let rows = outcome.rows().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["city"], json!("Oslo"));
        assert_eq!(rows[0]["opened"], json!("2021-04-01"));
        assert_eq!(session.get(QUERY_RESULT_KEY).unwrap()[1]["city"], json!("Bergen"));
    }

    #[tokio::test]
    async fn test_warehouse_errors_are_captured() {
        let validator = validator();
        let mut session = SessionState::new();

        let outcome = validator.validate("SELECT missing FROM stores", &mut session).await;
        let message = outcome.error_message().expect("error message");
        assert!(message.starts_with("Invalid SQL: "));
        assert!(message.contains("missing"));
    }

    #[tokio::test]
    async fn test_row_cap_applies() {
        let validator = SqlValidator::new(Arc::new(sales_warehouse()), 1);
        let mut session = SessionState::new();

        let outcome = validator.validate("SELECT * FROM sales", &mut session).await;
        assert_eq!(outcome.rows().map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_outcome_serializes_with_one_side_populated() {
        let rows = ValidationOutcome::Rows(vec![Map::new()]);
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!({"query_result": [{}], "error_message": null})
        );

        let error = ValidationOutcome::Error("Invalid SQL: boom".to_string());
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"query_result": null, "error_message": "Invalid SQL: boom"})
        );
    }
}

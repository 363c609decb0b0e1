//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting operations
//! that would otherwise fail midway.

use crate::config::{Settings, WarehouseBackend};
use crate::error::{GalleryError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// SQL generation requires an API key and a warehouse.
    GenerateSql,
    /// Validation only requires a warehouse.
    ValidateSql,
    /// The travel agent requires an API key.
    TravelAgent,
    /// Segment lookup runs locally.
    Segment,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::GenerateSql => {
            check_api_key(settings)?;
            check_warehouse(settings)?;
        }
        Operation::ValidateSql => {
            check_warehouse(settings)?;
        }
        Operation::TravelAgent => {
            check_api_key(settings)?;
        }
        Operation::Segment => {
            // No external requirements for segment lookup
        }
    }
    Ok(())
}

/// Check if the LLM API key is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    let var = &settings.llm.api_key_env;
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(GalleryError::Config(format!(
            "{} is empty. Set it with: export {}='sk-...'",
            var, var
        ))),
        // Local OpenAI-compatible servers usually accept any key
        Err(_) if settings.llm.api_base.is_some() => Ok(()),
        Err(_) => Err(GalleryError::Config(format!(
            "{} not set. Set it with: export {}='sk-...'",
            var, var
        ))),
    }
}

/// Check that the selected warehouse is configured.
fn check_warehouse(settings: &Settings) -> Result<()> {
    match settings.warehouse.backend {
        WarehouseBackend::Bigquery => {
            if settings.warehouse.project_id.is_none() {
                return Err(GalleryError::Config(
                    "No BigQuery project. Set warehouse.project_id or GOOGLE_CLOUD_PROJECT".to_string(),
                ));
            }
            if settings.warehouse.dataset_id.is_none() {
                return Err(GalleryError::Config(
                    "No BigQuery dataset. Set warehouse.dataset_id or BQ_DATASET_ID".to_string(),
                ));
            }
            Ok(())
        }
        WarehouseBackend::Sqlite => {
            let path = settings.sqlite_path();
            if path.exists() {
                Ok(())
            } else {
                Err(GalleryError::Config(format!(
                    "SQLite warehouse not found at {}. Set warehouse.sqlite_path",
                    path.display()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_segment_no_requirements() {
        assert!(check(Operation::Segment, &Settings::default()).is_ok());
    }

    #[test]
    fn test_bigquery_requires_project_and_dataset() {
        let mut settings = Settings::default();
        settings.warehouse.backend = WarehouseBackend::Bigquery;
        assert!(check(Operation::ValidateSql, &settings).is_err());

        settings.warehouse.project_id = Some("demo".to_string());
        settings.warehouse.dataset_id = Some("sales".to_string());
        assert!(check(Operation::ValidateSql, &settings).is_ok());
    }

    #[test]
    fn test_sqlite_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse.db");

        let mut settings = Settings::default();
        settings.warehouse.backend = WarehouseBackend::Sqlite;
        settings.warehouse.sqlite_path = path.to_string_lossy().to_string();
        assert!(check(Operation::ValidateSql, &settings).is_err());

        std::fs::write(&path, b"").unwrap();
        assert!(check(Operation::ValidateSql, &settings).is_ok());
    }
}

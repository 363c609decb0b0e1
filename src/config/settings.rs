//! Configuration settings for the agent gallery.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub nl2sql: Nl2SqlSettings,
    pub warehouse: WarehouseSettings,
    pub travel: TravelSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Settings for the OpenAI-compatible LLM endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of the API. None uses the OpenAI default.
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model driving the tool-calling agents.
    pub agent_model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            agent_model: "gpt-4o-mini".to_string(),
            timeout_secs: 300,
        }
    }
}

/// SQL generation strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Nl2SqlMethod {
    /// Single prompt, single call.
    #[default]
    Baseline,
    /// Divide-and-conquer generation followed by a fix-up pass.
    Chase,
}

impl std::str::FromStr for Nl2SqlMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" => Ok(Nl2SqlMethod::Baseline),
            "chase" => Ok(Nl2SqlMethod::Chase),
            _ => Err(format!("Unknown NL2SQL method: {}", s)),
        }
    }
}

impl std::fmt::Display for Nl2SqlMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nl2SqlMethod::Baseline => write!(f, "baseline"),
            Nl2SqlMethod::Chase => write!(f, "chase"),
        }
    }
}

/// Natural-language-to-SQL settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Nl2SqlSettings {
    /// Generation strategy (baseline, chase).
    pub method: Nl2SqlMethod,
    /// Model used for SQL generation.
    pub model: String,
    /// Sampling temperature for SQL generation.
    pub temperature: f32,
    /// Row cap appended as LIMIT and applied to returned results.
    pub max_rows: usize,
}

impl Default for Nl2SqlSettings {
    fn default() -> Self {
        Self {
            method: Nl2SqlMethod::Baseline,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_rows: 80,
        }
    }
}

/// Warehouse backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    /// Google BigQuery over its REST API.
    #[default]
    Bigquery,
    /// A local SQLite database file, opened read-only.
    Sqlite,
}

impl std::fmt::Display for WarehouseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarehouseBackend::Bigquery => write!(f, "bigquery"),
            WarehouseBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Data warehouse settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Backend (bigquery, sqlite).
    pub backend: WarehouseBackend,
    /// Cloud project that owns the dataset and runs the jobs.
    pub project_id: Option<String>,
    /// Dataset whose tables are exposed to the agent.
    pub dataset_id: Option<String>,
    /// Processing location for query jobs.
    pub location: Option<String>,
    /// Environment variable holding an OAuth access token.
    pub access_token_env: String,
    /// Path to the SQLite database (for sqlite backend).
    pub sqlite_path: String,
    /// Example rows per table included in the generated DDL.
    pub sample_rows: usize,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            backend: WarehouseBackend::Bigquery,
            project_id: None,
            dataset_id: None,
            location: None,
            access_token_env: "BQ_ACCESS_TOKEN".to_string(),
            sqlite_path: "~/.agent-gallery/warehouse.db".to_string(),
            sample_rows: 5,
        }
    }
}

/// Travel concierge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TravelSettings {
    /// Scenario file preloaded into new travel sessions.
    pub scenario_path: Option<String>,
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file contents.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> crate::error::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = lookup("BQ_PROJECT_ID").or_else(|| lookup("GOOGLE_CLOUD_PROJECT")) {
            debug!("Warehouse project overridden from environment");
            self.warehouse.project_id = Some(project);
        }
        if let Some(dataset) = lookup("BQ_DATASET_ID") {
            self.warehouse.dataset_id = Some(dataset);
        }
        if let Some(method) = lookup("NL2SQL_METHOD") {
            self.nl2sql.method = method
                .parse()
                .map_err(crate::error::GalleryError::Config)?;
        }
        if let Some(model) = lookup("BASELINE_NL2SQL_MODEL") {
            self.nl2sql.model = model;
        }
        if let Some(model) = lookup("ROOT_AGENT_MODEL") {
            self.llm.agent_model = model;
        }
        if let Some(base) = lookup("OPENAI_BASE_URL") {
            self.llm.api_base = Some(base);
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GalleryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agent-gallery")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded SQLite warehouse path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.warehouse.sqlite_path)
    }

    /// Get the expanded scenario path, if configured.
    pub fn scenario_path(&self) -> Option<PathBuf> {
        self.travel.scenario_path.as_deref().map(Self::expand_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.nl2sql.max_rows, 80);
        assert_eq!(settings.nl2sql.method, Nl2SqlMethod::Baseline);
        assert_eq!(settings.warehouse.backend, WarehouseBackend::Bigquery);
        assert_eq!(settings.warehouse.sample_rows, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_CLOUD_PROJECT", "demo-project"),
            ("BQ_DATASET_ID", "forecasting_sticker_sales"),
            ("NL2SQL_METHOD", "CHASE"),
            ("BASELINE_NL2SQL_MODEL", "gemini-1.5-flash"),
            ("ROOT_AGENT_MODEL", ""),
        ]);

        let mut settings = Settings::default();
        settings
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.warehouse.project_id.as_deref(), Some("demo-project"));
        assert_eq!(
            settings.warehouse.dataset_id.as_deref(),
            Some("forecasting_sticker_sales")
        );
        assert_eq!(settings.nl2sql.method, Nl2SqlMethod::Chase);
        assert_eq!(settings.nl2sql.model, "gemini-1.5-flash");
        // Empty values are ignored
        assert_eq!(settings.llm.agent_model, "gpt-4o-mini");
    }

    #[test]
    fn test_bq_project_takes_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_CLOUD_PROJECT", "compute-project"),
            ("BQ_PROJECT_ID", "data-project"),
        ]);

        let mut settings = Settings::default();
        settings
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.warehouse.project_id.as_deref(), Some("data-project"));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_env_from(|key| {
            (key == "NL2SQL_METHOD").then(|| "magic".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.warehouse.backend = WarehouseBackend::Sqlite;
        settings.warehouse.sqlite_path = "/tmp/sales.db".to_string();
        settings.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = toml::from_str(&content).unwrap();
        assert_eq!(loaded.warehouse.backend, WarehouseBackend::Sqlite);
        assert_eq!(loaded.warehouse.sqlite_path, "/tmp/sales.db");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = toml::from_str("[nl2sql]\nmax_rows = 10\n").unwrap();
        assert_eq!(settings.nl2sql.max_rows, 10);
        assert_eq!(settings.nl2sql.temperature, 0.1);
        assert_eq!(settings.llm.timeout_secs, 300);
    }
}

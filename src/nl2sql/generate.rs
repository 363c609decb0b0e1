//! Prompt-driven SQL generation.

use super::{DATABASE_SETTINGS_KEY, SQL_QUERY_KEY};
use crate::config::{Nl2SqlMethod, Nl2SqlSettings, Prompts};
use crate::error::{GalleryError, Result};
use crate::llm::TextGenerator;
use crate::session::SessionState;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("Invalid regex"))
}

/// Generates SQL for a question using the schema stored in the session.
pub struct SqlGenerator {
    llm: Arc<dyn TextGenerator>,
    prompts: Prompts,
    method: Nl2SqlMethod,
    model: String,
    temperature: f32,
    max_rows: usize,
}

impl SqlGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, settings: &Nl2SqlSettings, prompts: Prompts) -> Self {
        Self {
            llm,
            prompts,
            method: settings.method,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_rows: settings.max_rows,
        }
    }

    pub fn method(&self) -> Nl2SqlMethod {
        self.method
    }

    /// Generate a query for `question` and store it at `sql_query`.
    #[instrument(skip(self, session), fields(method = %self.method))]
    pub async fn generate(&self, question: &str, session: &mut SessionState) -> Result<String> {
        let schema = session
            .get(DATABASE_SETTINGS_KEY)
            .and_then(|settings| settings.get("ddl_schema"))
            .and_then(|schema| schema.as_str())
            .ok_or_else(|| {
                GalleryError::Session(format!(
                    "No schema found at '{}.ddl_schema'; load the database settings first",
                    DATABASE_SETTINGS_KEY
                ))
            })?
            .to_string();

        let mut vars = HashMap::new();
        vars.insert("schema".to_string(), schema);
        vars.insert("question".to_string(), question.to_string());
        vars.insert("max_rows".to_string(), self.max_rows.to_string());

        let sql = match self.method {
            Nl2SqlMethod::Baseline => {
                let prompt = self.prompts.render_with_custom(&self.prompts.nl2sql.baseline, &vars);
                let response = self.complete(&prompt).await?;
                strip_code_fences(&response)
            }
            Nl2SqlMethod::Chase => {
                let prompt = self
                    .prompts
                    .render_with_custom(&self.prompts.nl2sql.chase_generate, &vars);
                let draft = extract_final_sql(&self.complete(&prompt).await?);
                debug!("CHASE draft: {}", draft);

                vars.insert("sql".to_string(), draft);
                let prompt = self.prompts.render_with_custom(&self.prompts.nl2sql.chase_fix, &vars);
                strip_code_fences(&self.complete(&prompt).await?)
            }
        };

        info!("Generated SQL ({} chars)", sql.len());
        session.set(SQL_QUERY_KEY, sql.clone());
        Ok(sql)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.llm.generate(&self.model, prompt, self.temperature).await
    }
}

/// Remove Markdown code fences around a query and trim it.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(caps) = fenced_block().captures(trimmed) {
        if let Some(body) = caps.get(1) {
            return body.as_str().trim().to_string();
        }
    }
    trimmed
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// Pick the last fenced block of a reasoning response, or the whole text if none.
pub fn extract_final_sql(text: &str) -> String {
    fenced_block()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .last()
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| strip_code_fences(text))
}

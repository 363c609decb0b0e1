//! SQL command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, SqlAction};
use crate::config::{Nl2SqlMethod, Prompts, Settings};
use crate::llm::OpenAIGenerator;
use crate::nl2sql::{SchemaCache, SqlGenerator, SqlValidator, ValidationOutcome};
use crate::session::SessionState;
use crate::warehouse;
use anyhow::Result;
use std::sync::Arc;

/// Run the sql command.
pub async fn run_sql(action: &SqlAction, mut settings: Settings) -> Result<()> {
    match action {
        SqlAction::Schema => {
            run_preflight(Operation::ValidateSql, &settings)?;
            let cache = schema_cache(&settings).await?;

            let spinner = Output::spinner("Reading warehouse schema...");
            let ddl = cache.ddl().await;
            spinner.finish_and_clear();
            println!("{}", ddl?);
        }

        SqlAction::Generate { question, method } => {
            apply_method(&mut settings, method.as_deref())?;
            run_preflight(Operation::GenerateSql, &settings)?;

            let cache = schema_cache(&settings).await?;
            let mut session = SessionState::new();
            let sql = generate(&settings, &cache, question, &mut session).await?;
            Output::sql(&sql);
        }

        SqlAction::Validate { sql, max_rows, json } => {
            run_preflight(Operation::ValidateSql, &settings)?;
            let max_rows = max_rows.unwrap_or(settings.nl2sql.max_rows);
            let validator = SqlValidator::new(warehouse::connect(&settings).await?, max_rows);

            let mut session = SessionState::new();
            let spinner = Output::spinner("Validating...");
            let outcome = validator.validate(sql, &mut session).await;
            spinner.finish_and_clear();

            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }

        SqlAction::Ask { question, method } => {
            apply_method(&mut settings, method.as_deref())?;
            run_preflight(Operation::GenerateSql, &settings)?;

            let cache = schema_cache(&settings).await?;
            let mut session = SessionState::new();
            let sql = generate(&settings, &cache, question, &mut session).await?;
            Output::header("SQL");
            Output::sql(&sql);

            let validator = SqlValidator::new(cache.warehouse().clone(), settings.nl2sql.max_rows);
            let spinner = Output::spinner("Running query...");
            let outcome = validator.validate(&sql, &mut session).await;
            spinner.finish_and_clear();

            Output::header("Result");
            print_outcome(&outcome);
        }
    }

    Ok(())
}

fn run_preflight(operation: Operation, settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(operation, settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agent-gallery doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(())
}

fn apply_method(settings: &mut Settings, method: Option<&str>) -> Result<()> {
    if let Some(method) = method {
        settings.nl2sql.method = method
            .parse::<Nl2SqlMethod>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

pub(crate) async fn schema_cache(settings: &Settings) -> Result<SchemaCache> {
    let warehouse = warehouse::connect(settings).await?;
    Ok(SchemaCache::new(warehouse, settings.warehouse.sample_rows))
}

pub(crate) fn sql_generator(settings: &Settings) -> Result<SqlGenerator> {
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let llm = Arc::new(OpenAIGenerator::new(&settings.llm)?);
    Ok(SqlGenerator::new(llm, &settings.nl2sql, prompts))
}

async fn generate(
    settings: &Settings,
    cache: &SchemaCache,
    question: &str,
    session: &mut SessionState,
) -> Result<String> {
    let generator = sql_generator(settings)?;

    let spinner = Output::spinner("Reading warehouse schema...");
    let loaded = cache.load_into(session).await;
    spinner.finish_and_clear();
    loaded?;

    let spinner = Output::spinner(&format!("Generating SQL ({})...", generator.method()));
    let sql = generator.generate(question, session).await;
    spinner.finish_and_clear();
    Ok(sql?)
}

fn print_outcome(outcome: &ValidationOutcome) {
    match outcome {
        ValidationOutcome::Rows(rows) => {
            Output::rows(rows);
            Output::success(&format!("{} row(s)", rows.len()));
        }
        ValidationOutcome::Error(message) => Output::error(message),
    }
}

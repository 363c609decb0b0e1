//! Agent command implementation.

use super::sql::{schema_cache, sql_generator};
use super::trip::travel_session;
use crate::agent::{Agent, AgentResponse, DataScienceTools, TravelTools};
use crate::cli::output::truncate;
use crate::cli::preflight::{self, Operation};
use crate::cli::{AgentKind, Output};
use crate::config::{Prompts, Settings};
use crate::nl2sql::SqlValidator;
use crate::session::SessionState;
use crate::travel;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Run the agent command.
pub async fn run_agent(kind: &AgentKind, settings: Settings) -> Result<()> {
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    let (agent, task, mut session) = match kind {
        AgentKind::Data { task, model } => {
            check(Operation::GenerateSql, &settings)?;

            let cache = schema_cache(&settings).await?;
            let mut session = SessionState::new();
            let spinner = Output::spinner("Reading warehouse schema...");
            let loaded = cache.load_into(&mut session).await;
            spinner.finish_and_clear();
            loaded?;

            let validator = SqlValidator::new(cache.warehouse().clone(), settings.nl2sql.max_rows);
            let tools = DataScienceTools::new(sql_generator(&settings)?, validator);

            let system_prompt = prompts.render_with_custom(&prompts.agent.data_science, &HashMap::new());
            let agent = with_model(Agent::new(&settings.llm, Arc::new(tools))?, model.as_deref())
                .with_system_prompt(&system_prompt);
            (agent, task, session)
        }

        AgentKind::Travel {
            task,
            scenario,
            at,
            model,
        } => {
            check(Operation::TravelAgent, &settings)?;

            let session = travel_session(&settings, scenario.as_deref(), at.as_deref())?;
            let mut vars = HashMap::new();
            vars.insert(
                "transit_instruction".to_string(),
                travel::transit_instruction(&session, &prompts)?,
            );
            let system_prompt = prompts.render_with_custom(&prompts.agent.travel, &vars);

            let agent = with_model(Agent::new(&settings.llm, Arc::new(TravelTools))?, model.as_deref())
                .with_system_prompt(&system_prompt);
            (agent, task, session)
        }
    };

    let spinner = Output::spinner("Agent working...");
    let result = agent.run(task, &mut session).await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => print_response(&response),
        Err(e) => {
            Output::error(&format!("Agent failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

fn check(operation: Operation, settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(operation, settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agent-gallery doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(())
}

fn with_model(agent: Agent, model: Option<&str>) -> Agent {
    match model {
        Some(model) => agent.with_model(model),
        None => agent,
    }
}

fn print_response(response: &AgentResponse) {
    println!("\n{}\n", response.content);

    if !response.tool_calls.is_empty() {
        Output::header(&format!("Tool calls ({})", response.tool_calls.len()));
        for call in &response.tool_calls {
            Output::info(&format!("  {} {}", call.name, truncate(&call.arguments, 60)));
        }
        println!();
    }

    Output::info(&format!("Completed in {} iteration(s)", response.iterations));
}

//! Agent Gallery CLI entry point.

use agent_gallery::cli::{commands, Cli, Commands};
use agent_gallery::config::Settings;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Load configuration
    let config_path = cli.config.as_deref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("agent_gallery={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, config_path.as_ref())?;
        }

        Commands::Sql { action } => {
            commands::run_sql(action, settings).await?;
        }

        Commands::Trip { action } => {
            commands::run_trip(action, settings)?;
        }

        Commands::Agent { agent } => {
            commands::run_agent(agent, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}

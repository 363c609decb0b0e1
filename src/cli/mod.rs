//! CLI module for the agent gallery.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Agent Gallery - example LLM agents
///
/// A travel concierge that works out the current leg of a trip, and a data
/// analyst that turns questions into SQL and checks it against a warehouse.
#[derive(Parser, Debug)]
#[command(name = "agent-gallery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Natural-language SQL over the configured warehouse
    Sql {
        #[command(subcommand)]
        action: SqlAction,
    },

    /// Itinerary tools for the travel concierge
    Trip {
        #[command(subcommand)]
        action: TripAction,
    },

    /// Run a tool-calling agent on a task
    Agent {
        #[command(subcommand)]
        agent: AgentKind,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SqlAction {
    /// Print the DDL the generator sees
    Schema,

    /// Generate SQL for a question without running it
    Generate {
        /// The question to answer
        question: String,

        /// Generation method (baseline or chase)
        #[arg(short, long)]
        method: Option<String>,
    },

    /// Validate SQL against the warehouse and print the rows
    Validate {
        /// The SQL to validate
        sql: String,

        /// Maximum number of rows to return
        #[arg(short, long)]
        max_rows: Option<usize>,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Generate SQL for a question, then validate it
    Ask {
        /// The question to answer
        question: String,

        /// Generation method (baseline or chase)
        #[arg(short, long)]
        method: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TripAction {
    /// Show the current leg of the trip
    Segment {
        /// Scenario file with {"state": {...}} (defaults to travel.scenario_path)
        #[arg(short, long)]
        scenario: Option<String>,

        /// Current time, e.g. "2025-06-15 08:00" (defaults to the itinerary start)
        #[arg(short, long)]
        at: Option<String>,
    },

    /// Print the instruction the in-trip agent would receive
    Brief {
        /// Scenario file with {"state": {...}} (defaults to travel.scenario_path)
        #[arg(short, long)]
        scenario: Option<String>,

        /// Current time, e.g. "2025-06-15 08:00" (defaults to the itinerary start)
        #[arg(short, long)]
        at: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AgentKind {
    /// Answer a question about the warehouse data
    Data {
        /// The question or task
        task: String,

        /// LLM model to use for the agent loop
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Talk to the in-trip travel concierge
    Travel {
        /// The request
        task: String,

        /// Scenario file with {"state": {...}} (defaults to travel.scenario_path)
        #[arg(short, long)]
        scenario: Option<String>,

        /// Current time, e.g. "2025-06-15 08:00" (defaults to the itinerary start)
        #[arg(short, long)]
        at: Option<String>,

        /// LLM model to use for the agent loop
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

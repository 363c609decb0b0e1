//! Agent Gallery - example LLM agents
//!
//! Two small agent applications sharing one configuration, logging and LLM stack.
//!
//! # Overview
//!
//! - A travel concierge that works out the current leg of a trip from a traveler
//!   profile, an itinerary and the current time, and keeps session memory.
//! - A data analyst that turns natural-language questions into SQL, validates the
//!   SQL against a warehouse (read-only guard, dry run, bounded execution) and
//!   describes the warehouse schema as DDL.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `session` - Per-conversation key/value state
//! - `llm` - Text generation behind the `TextGenerator` trait
//! - `warehouse` - BigQuery and SQLite behind the `Warehouse` trait
//! - `nl2sql` - SQL generation, validation and DDL
//! - `travel` - Itinerary model, segment finder and memory tools
//! - `agent` - Tool-calling loop and toolboxes
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_gallery::config::Settings;
//! use agent_gallery::nl2sql::SqlValidator;
//! use agent_gallery::session::SessionState;
//! use agent_gallery::warehouse;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let validator = SqlValidator::new(
//!         warehouse::connect(&settings).await?,
//!         settings.nl2sql.max_rows,
//!     );
//!
//!     let mut session = SessionState::new();
//!     let outcome = validator
//!         .validate("SELECT city, COUNT(*) AS n FROM stores GROUP BY city", &mut session)
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod nl2sql;
pub mod openai;
pub mod session;
pub mod travel;
pub mod warehouse;

pub use error::{GalleryError, Result};

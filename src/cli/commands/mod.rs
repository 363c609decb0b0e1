//! CLI command implementations.

mod agent;
mod config;
mod doctor;
mod sql;
mod trip;

pub use agent::run_agent;
pub use config::run_config;
pub use doctor::run_doctor;
pub use sql::run_sql;
pub use trip::run_trip;

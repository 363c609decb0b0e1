//! Natural-language-to-SQL tooling.
//!
//! Generation turns a question plus the warehouse DDL into a query; validation runs
//! that query through a read-only guard, a dry run and a bounded execution.

mod ddl;
pub mod guard;
mod generate;
mod validate;

pub use ddl::{generate_ddl, render_table_ddl, DatabaseSettings, SchemaCache};
pub use generate::{extract_final_sql, strip_code_fences, SqlGenerator};
pub use validate::{
    cleanup_sql, SqlValidator, ValidationOutcome, DISALLOWED_MESSAGE, NO_RESULTS_MESSAGE,
};

/// Session key holding the serialized [`DatabaseSettings`].
pub const DATABASE_SETTINGS_KEY: &str = "database_settings";

/// Session key holding the most recently generated query.
pub const SQL_QUERY_KEY: &str = "sql_query";

/// Session key holding the rows of the most recent successful validation.
pub const QUERY_RESULT_KEY: &str = "query_result";

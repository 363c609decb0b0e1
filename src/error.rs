//! Error types for the agent gallery.

use thiserror::Error;

/// Library-level error type for gallery operations.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Session state error: {0}")]
    Session(String),

    #[error("Itinerary error: {0}")]
    Itinerary(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Agent error: {0}")]
    Agent(String),
}

/// Result type alias for gallery operations.
pub type Result<T> = std::result::Result<T, GalleryError>;

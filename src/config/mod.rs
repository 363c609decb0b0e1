//! Configuration module for the agent gallery.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Nl2SqlPrompts, Prompts, TravelPrompts};
pub use settings::{
    GeneralSettings, LlmSettings, Nl2SqlMethod, Nl2SqlSettings, PromptSettings, Settings,
    TravelSettings, WarehouseBackend, WarehouseSettings,
};

//! Tool-calling agents.
//!
//! An [`Agent`] drives an OpenAI-compatible chat model through a tool loop. The tools
//! come from a [`Toolbox`]: SQL generation and validation for the data-science agent,
//! session memory and itinerary lookup for the travel concierge.

mod runner;
mod tools;

pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use tools::{
    data_tool_definitions, parse_data_tool_call, parse_travel_tool_call, travel_tool_definitions,
    DataScienceTools, DataToolCall, Toolbox, TravelToolCall, TravelTools,
};

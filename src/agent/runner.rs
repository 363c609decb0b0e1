//! Agent runner with tool calling loop.

use super::tools::Toolbox;
use crate::config::LlmSettings;
use crate::error::{GalleryError, Result};
use crate::session::SessionState;
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default system prompt for the agent.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools when they help answer the request.";

/// Agent that calls the tools of a [`Toolbox`] until the model gives a final answer.
pub struct Agent {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    toolbox: Arc<dyn Toolbox>,
    max_iterations: usize,
    system_prompt: String,
}

impl Agent {
    /// Create an agent for the configured endpoint and agent model.
    pub fn new(settings: &LlmSettings, toolbox: Arc<dyn Toolbox>) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model: settings.agent_model.clone(),
            toolbox,
            max_iterations: 15,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    /// Use a different model than the configured agent model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run the agent on a user task. Tools read and write `session`.
    ///
    /// Each iteration is one chat completion. The run ends when the model answers
    /// without requesting tools, or fails once `max_iterations` is used up.
    #[instrument(skip(self, task, session), fields(model = %self.model))]
    pub async fn run(&self, task: &str, session: &mut SessionState) -> Result<AgentResponse> {
        let mut messages = vec![system_message(&self.system_prompt)?, user_message(task)?];
        let mut tool_calls_made = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!("Agent iteration {} with {} messages", iteration, messages.len());

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages.clone())
                .tools(self.toolbox.definitions())
                .build()
                .map_err(|e| GalleryError::Agent(e.to_string()))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| GalleryError::OpenAI(format!("Agent API error: {}", e)))?;

            let message = response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message)
                .ok_or_else(|| GalleryError::Agent("No response from model".to_string()))?;

            let tool_calls = match message.tool_calls {
                Some(calls) if !calls.is_empty() => calls,
                _ => {
                    return Ok(AgentResponse {
                        content: message.content.unwrap_or_default(),
                        tool_calls: tool_calls_made,
                        iterations: iteration,
                    })
                }
            };

            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()
                    .map_err(|e| GalleryError::Agent(e.to_string()))?
                    .into(),
            );

            for tool_call in &tool_calls {
                let record = self.execute_tool_call(tool_call, session).await;
                messages.push(tool_message(&tool_call.id, &record.result)?);
                tool_calls_made.push(record);
            }
        }

        Err(GalleryError::Agent(format!(
            "Agent exceeded maximum iterations ({})",
            self.max_iterations
        )))
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(
        &self,
        tool_call: &ChatCompletionMessageToolCall,
        session: &mut SessionState,
    ) -> ToolCallRecord {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        // Failures go back to the model so it can correct itself
        let result = match self.toolbox.execute(name, arguments, session).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                format!("Tool error: {}", e)
            }
        };
        debug!("Tool {} returned: {}", name, truncate(&result, 200));

        ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
        }
    }
}

fn system_message(content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(content)
        .build()
        .map_err(|e| GalleryError::Agent(e.to_string()))?
        .into())
}

fn user_message(content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()
        .map_err(|e| GalleryError::Agent(e.to_string()))?
        .into())
}

fn tool_message(tool_call_id: &str, content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestToolMessageArgs::default()
        .tool_call_id(tool_call_id)
        .content(content)
        .build()
        .map_err(|e| GalleryError::Agent(e.to_string()))?
        .into())
}

/// Shorten a tool result for logging.
fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "validate_sql".to_string(),
            arguments: r#"{"sql": "SELECT 1"}"#.to_string(),
            result: r#"{"query_result":[{"1":1}],"error_message":null}"#.to_string(),
        };
        assert_eq!(format!("{}", record), r#"validate_sql({"sql": "SELECT 1"})"#);
    }

    #[test]
    fn test_truncate_for_logs() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("åååååå", 3), "ååå...");
    }

    #[tokio::test]
    async fn test_zero_iterations_is_an_error() {
        let settings = LlmSettings {
            api_base: Some("http://127.0.0.1:9/v1".to_string()),
            ..LlmSettings::default()
        };
        let agent = Agent::new(&settings, Arc::new(crate::agent::TravelTools))
            .unwrap()
            .with_max_iterations(0);

        let mut session = SessionState::new();
        match agent.run("Where next?", &mut session).await {
            Err(GalleryError::Agent(msg)) => assert!(msg.contains("maximum iterations (0)")),
            other => panic!("Expected agent error, got {:?}", other.map(|r| r.content)),
        }
    }
}

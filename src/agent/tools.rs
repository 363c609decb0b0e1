//! Tool definitions and implementations for the agents.

use crate::error::{GalleryError, Result};
use crate::nl2sql::{SqlGenerator, SqlValidator};
use crate::session::SessionState;
use crate::travel;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A set of tools an agent can call.
#[async_trait]
pub trait Toolbox: Send + Sync {
    /// Function definitions advertised to the model.
    fn definitions(&self) -> Vec<ChatCompletionTool>;

    /// Run the named tool with JSON `arguments` against the session.
    async fn execute(&self, name: &str, arguments: &str, session: &mut SessionState)
        -> Result<String>;
}

/// Tools of the data-science agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DataToolCall {
    /// Write SQL for a natural-language question.
    GenerateSql { question: String },

    /// Check SQL against the warehouse and return rows or an error.
    ValidateSql { sql: String },
}

/// Tools of the travel concierge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TravelToolCall {
    Memorize { key: String, value: String },
    MemorizeList { key: String, value: String },
    Forget { key: String, value: String },
    FindSegment,
}

/// SQL generation and validation backed by an LLM and a warehouse.
pub struct DataScienceTools {
    generator: SqlGenerator,
    validator: SqlValidator,
}

impl DataScienceTools {
    pub fn new(generator: SqlGenerator, validator: SqlValidator) -> Self {
        Self {
            generator,
            validator,
        }
    }
}

#[async_trait]
impl Toolbox for DataScienceTools {
    fn definitions(&self) -> Vec<ChatCompletionTool> {
        data_tool_definitions()
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &str,
        session: &mut SessionState,
    ) -> Result<String> {
        match parse_data_tool_call(name, arguments)? {
            DataToolCall::GenerateSql { question } => self.generator.generate(&question, session).await,
            DataToolCall::ValidateSql { sql } => {
                let outcome = self.validator.validate(&sql, session).await;
                Ok(serde_json::to_string(&outcome)?)
            }
        }
    }
}

/// Session memory and itinerary lookup.
#[derive(Debug, Default)]
pub struct TravelTools;

#[async_trait]
impl Toolbox for TravelTools {
    fn definitions(&self) -> Vec<ChatCompletionTool> {
        travel_tool_definitions()
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &str,
        session: &mut SessionState,
    ) -> Result<String> {
        match parse_travel_tool_call(name, arguments)? {
            TravelToolCall::Memorize { key, value } => Ok(travel::memorize(session, &key, &value)),
            TravelToolCall::MemorizeList { key, value } => {
                travel::memorize_list(session, &key, &value)
            }
            TravelToolCall::Forget { key, value } => travel::forget(session, &key, &value),
            TravelToolCall::FindSegment => match travel::current_segment(session)? {
                Some((_, segment)) => Ok(serde_json::to_string(&segment)?),
                None => Ok("No itinerary found in the session.".to_string()),
            },
        }
    }
}

fn function_tool(name: &str, description: &str, parameters: Value) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters: Some(parameters),
            strict: None,
        },
    }
}

fn key_value_parameters(key_description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "key": {
                "type": "string",
                "description": key_description
            },
            "value": {
                "type": "string",
                "description": "The information to store or remove"
            }
        },
        "required": ["key", "value"]
    })
}

/// OpenAI function definitions for the data-science agent.
pub fn data_tool_definitions() -> Vec<ChatCompletionTool> {
    vec![
        function_tool(
            "generate_sql",
            "Generate a SQL query for a natural language question about the warehouse. \
            The query is stored in the session for later validation.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question, in natural language"
                    }
                },
                "required": ["question"]
            }),
        ),
        function_tool(
            "validate_sql",
            "Validate a SQL query by dry-running and executing it against the warehouse. \
            Returns JSON with either 'query_result' rows or an 'error_message'.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "The SQL query to validate"
                    }
                },
                "required": ["sql"]
            }),
        ),
    ]
}

/// OpenAI function definitions for the travel concierge.
pub fn travel_tool_definitions() -> Vec<ChatCompletionTool> {
    vec![
        function_tool(
            "memorize",
            "Remember a single fact about the user, replacing any previous value.",
            key_value_parameters("Label of the fact, e.g. 'seat_preference'"),
        ),
        function_tool(
            "memorize_list",
            "Add a value to a list of facts about the user, such as food preferences.",
            key_value_parameters("Label of the list, e.g. 'food_preference'"),
        ),
        function_tool(
            "forget",
            "Remove a previously remembered value.",
            key_value_parameters("Label the value was stored under"),
        ),
        function_tool(
            "find_segment",
            "Find the current leg of the trip: where the user travels from and to, \
            when they can leave and when they must arrive.",
            serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        ),
    ]
}

fn parse_arguments(arguments: &str) -> Result<Value> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(arguments)
        .map_err(|e| GalleryError::Agent(format!("Invalid tool arguments: {}", e)))
}

fn string_arg(args: &Value, name: &str) -> Result<String> {
    args[name]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GalleryError::Agent(format!("Missing '{}' argument", name)))
}

/// Parse a data-science tool call from the OpenAI response format.
pub fn parse_data_tool_call(name: &str, arguments: &str) -> Result<DataToolCall> {
    let args = parse_arguments(arguments)?;

    match name {
        "generate_sql" => Ok(DataToolCall::GenerateSql {
            question: string_arg(&args, "question")?,
        }),
        "validate_sql" => Ok(DataToolCall::ValidateSql {
            sql: string_arg(&args, "sql")?,
        }),
        _ => Err(GalleryError::Agent(format!("Unknown tool: {}", name))),
    }
}

/// Parse a travel tool call from the OpenAI response format.
pub fn parse_travel_tool_call(name: &str, arguments: &str) -> Result<TravelToolCall> {
    let args = parse_arguments(arguments)?;

    match name {
        "memorize" => Ok(TravelToolCall::Memorize {
            key: string_arg(&args, "key")?,
            value: string_arg(&args, "value")?,
        }),
        "memorize_list" => Ok(TravelToolCall::MemorizeList {
            key: string_arg(&args, "key")?,
            value: string_arg(&args, "value")?,
        }),
        "forget" => Ok(TravelToolCall::Forget {
            key: string_arg(&args, "key")?,
            value: string_arg(&args, "value")?,
        }),
        "find_segment" => Ok(TravelToolCall::FindSegment),
        _ => Err(GalleryError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Nl2SqlSettings, Prompts};
    use crate::llm::TextGenerator;
    use crate::nl2sql::{DATABASE_SETTINGS_KEY, QUERY_RESULT_KEY, SQL_QUERY_KEY};
    use crate::warehouse::sales_warehouse;
    use serde_json::json;
    use std::sync::Arc;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn data_tools(response: &'static str) -> DataScienceTools {
        let generator = SqlGenerator::new(
            Arc::new(FixedGenerator(response)),
            &Nl2SqlSettings::default(),
            Prompts::default(),
        );
        let validator = SqlValidator::new(Arc::new(sales_warehouse()), 80);
        DataScienceTools::new(generator, validator)
    }

    #[test]
    fn test_definitions_match_parsers() {
        for tool in data_tool_definitions() {
            let err = parse_data_tool_call(&tool.function.name, "{}").unwrap_err();
            assert!(err.to_string().contains("Missing"));
        }
        let names: Vec<_> = travel_tool_definitions()
            .into_iter()
            .map(|t| t.function.name)
            .collect();
        assert_eq!(names, vec!["memorize", "memorize_list", "forget", "find_segment"]);
        assert_eq!(
            parse_travel_tool_call("find_segment", "").unwrap(),
            TravelToolCall::FindSegment
        );
    }

    #[test]
    fn test_parse_tool_calls() {
        assert_eq!(
            parse_data_tool_call("validate_sql", r#"{"sql": "SELECT 1"}"#).unwrap(),
            DataToolCall::ValidateSql {
                sql: "SELECT 1".to_string()
            }
        );
        assert_eq!(
            parse_travel_tool_call("memorize_list", r#"{"key": "food", "value": "vegan"}"#).unwrap(),
            TravelToolCall::MemorizeList {
                key: "food".to_string(),
                value: "vegan".to_string()
            }
        );
        assert!(parse_data_tool_call("drop_everything", "{}").is_err());
        assert!(parse_travel_tool_call("memorize", "not json").is_err());
    }

    #[tokio::test]
    async fn test_data_tools_generate_then_validate() {
        let tools = data_tools("```sql\nSELECT city FROM stores ORDER BY store_id\n```");
        let mut session = SessionState::new();
        session.set(DATABASE_SETTINGS_KEY, json!({"ddl_schema": "CREATE TABLE stores (city TEXT);"}));

        let sql = tools
            .execute("generate_sql", r#"{"question": "Which cities?"}"#, &mut session)
            .await
            .unwrap();
        assert_eq!(sql, "SELECT city FROM stores ORDER BY store_id");
        assert_eq!(session.get_str(SQL_QUERY_KEY), Some(sql.as_str()));

        let args = serde_json::to_string(&json!({ "sql": sql })).unwrap();
        let output = tools.execute("validate_sql", &args, &mut session).await.unwrap();
        let output: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(output["query_result"][0]["city"], json!("Oslo"));
        assert_eq!(output["error_message"], Value::Null);
        assert!(session.contains(QUERY_RESULT_KEY));
    }

    #[tokio::test]
    async fn test_travel_tools() {
        let tools = TravelTools;
        let mut session = SessionState::new();

        let status = tools
            .execute("memorize", r#"{"key": "seat", "value": "aisle"}"#, &mut session)
            .await
            .unwrap();
        assert_eq!(status, "Stored \"seat\": \"aisle\"");

        let none = tools.execute("find_segment", "{}", &mut session).await.unwrap();
        assert_eq!(none, "No itinerary found in the session.");

        session.set(travel::SYSTEM_TIME_KEY, "2025-06-15 05:00:00");
        session.set(
            travel::ITINERARY_KEY,
            json!({"days": [{"date": "2025-06-15", "events": [
                {"event_type": "visit", "description": "Museum", "start_time": "10:00"}
            ]}]}),
        );
        let segment = tools.execute("find_segment", "{}", &mut session).await.unwrap();
        let segment: Value = serde_json::from_str(&segment).unwrap();
        assert_eq!(segment["travel_to"], json!("Museum"));
        assert_eq!(segment["arrive_by"], json!("10:00"));
    }
}

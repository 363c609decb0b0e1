//! Prompt templates for the gallery agents.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub nl2sql: Nl2SqlPrompts,
    pub travel: TravelPrompts,
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for SQL generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Nl2SqlPrompts {
    /// Single-shot generation.
    pub baseline: String,
    /// Divide-and-conquer generation (first CHASE pass).
    pub chase_generate: String,
    /// Dialect and schema fix-up (second CHASE pass).
    pub chase_fix: String,
}

impl Default for Nl2SqlPrompts {
    fn default() -> Self {
        Self {
            baseline: r#"You are a SQL expert tasked with answering questions about data by writing a single, read-only query for the warehouse described below.

**Guidelines:**
- **Table Referencing:** Always use the fully qualified table names exactly as they appear in the schema.
- **Joins:** Join as few tables as possible. Check column types on both sides of every join condition.
- **Aggregations:** Use aggregate functions (SUM, AVG, COUNT, MAX, MIN) when the question asks for totals, averages or extremes.
- **Filtering:** Only filter on columns that exist in the schema. Use the example rows to infer value formats.
- **Limiting Results:** Return at most {{max_rows}} rows.
- **Read-only:** Never write INSERT, UPDATE, DELETE, MERGE or any DDL statement.
- **Output:** Respond with the SQL query only, no explanation.

**Schema:**
```
{{schema}}
```

**Natural language question:**
```
{{question}}
```

Think step by step about the tables and columns you need, then write the query."#
                .to_string(),

            chase_generate: r#"You are an experienced database expert. Answer the question below by generating a single SQL query for the given schema.

Use a divide and conquer approach:
1. **Divide:** Break the question into smaller sub-questions, each answerable with a simple query.
2. **Conquer:** Write a pseudo SQL fragment for each sub-question.
3. **Assemble:** Combine the fragments into one final query, simplifying where possible.

Rules:
- Only reference tables and columns present in the schema, fully qualified as shown.
- The query must be a read-only SELECT (a WITH clause is allowed).
- Return at most {{max_rows}} rows.

**Schema:**
```
{{schema}}
```

**Question:**
{{question}}

Write your reasoning, then give the final query in a single ```sql code block at the end."#
                .to_string(),

            chase_fix: r#"You are a SQL reviewer. The query below was written to answer a question over the given schema. Fix any problem you find so that it runs correctly on the target warehouse:
- table or column names that do not exist or are not fully qualified
- functions or syntax not supported by the warehouse dialect
- type mismatches in comparisons and joins
- a missing row limit (at most {{max_rows}} rows)

If the query is already correct, return it unchanged. Respond with the SQL query only.

**Schema:**
```
{{schema}}
```

**Question:**
{{question}}

**Query:**
```sql
{{sql}}
```"#
                .to_string(),
        }
    }
}

/// Prompts for in-trip transit coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelPrompts {
    /// Used when the session holds no itinerary.
    pub need_itinerary: String,
    /// Used with the current segment of the trip.
    pub logistics: String,
}

impl Default for TravelPrompts {
    fn default() -> Self {
        Self {
            need_itinerary: r#"Cannot find an itinerary to act on.
Inform the user that you can help once there is an itinerary, and ask them to transfer to the planning agent first.
Do not ask the user for the itinerary yourself."#
                .to_string(),

            logistics: r#"You are an agent helping a traveler get to the next destination on their trip.

Current time is "{{current_datetime}}".
The user is going to:
<TO>{{travel_to}}</TO>
They should arrive by {{arrive_by}}.

The user is currently at:
<FROM>{{travel_from}}</FROM>
They can leave {{leave_by}}.

Judge whether the user needs to take action:
- If there is nothing to do, tell the user no travel is needed right now.
- Otherwise, help them plan how to get from <FROM/> to <TO/>: estimate travel time, suggest a departure time, and point out anything they must do first (check in, print boarding passes, book a ride)."#
                .to_string(),
        }
    }
}

/// System prompts for the tool-calling agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub data_science: String,
    pub travel: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            data_science: r#"You are a data analyst answering questions about a data warehouse.

You have tools to write SQL from a question and to validate SQL against the warehouse.

Guidelines:
- Use 'generate_sql' to turn the user's question into a query
- Always use 'validate_sql' on the generated query before answering
- If validation returns an error message, fix the query and validate again
- Answer using only the returned rows; say so if the result is empty

When you have the answer, summarize it clearly and include the final SQL."#
                .to_string(),

            travel: r#"You are a travel concierge assisting a traveler during their trip.

You have tools to remember facts about the user, forget them, and look up the current leg of the itinerary.

Guidelines:
- Use 'memorize' to store single facts, 'memorize_list' for preferences that accumulate
- Use 'forget' when the user withdraws a preference
- Use 'find_segment' when you need to know where the user is travelling from and to

{{transit_instruction}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let nl2sql_path = custom_path.join("nl2sql.toml");
            if nl2sql_path.exists() {
                let content = std::fs::read_to_string(&nl2sql_path)?;
                prompts.nl2sql = toml::from_str(&content)?;
            }

            let travel_path = custom_path.join("travel.toml");
            if travel_path.exists() {
                let content = std::fs::read_to_string(&travel_path)?;
                prompts.travel = toml::from_str(&content)?;
            }

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.nl2sql.baseline.contains("{{schema}}"));
        assert!(prompts.nl2sql.baseline.contains("{{question}}"));
        assert!(prompts.nl2sql.chase_fix.contains("{{sql}}"));
        assert!(prompts.travel.logistics.contains("{{travel_from}}"));
        assert!(!prompts.agent.data_science.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_variables_are_overridden() {
        let mut custom = HashMap::new();
        custom.insert("dialect".to_string(), "GoogleSQL".to_string());
        custom.insert("question".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "How many stores?".to_string());
        let rendered = prompts.render_with_custom("{{dialect}}: {{question}}", &vars);
        assert_eq!(rendered, "GoogleSQL: How many stores?");
    }

    #[test]
    fn test_load_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("travel.toml"),
            "need_itinerary = \"No trip yet.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.travel.need_itinerary, "No trip yet.");
        // Fields missing from the file keep their defaults
        assert!(prompts.travel.logistics.contains("{{travel_to}}"));
        assert!(prompts.nl2sql.baseline.contains("{{schema}}"));
    }
}

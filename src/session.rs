//! Session-scoped key/value state shared between agent steps.

use crate::error::{GalleryError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Mutable state carried across the tool calls of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    id: Uuid,
    values: Map<String, Value>,
}

impl SessionState {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            values: Map::new(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store a value, replacing any previous one.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Serialize and store a value.
    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.values
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Copy every entry of `source` into the session.
    pub fn extend(&mut self, source: &Map<String, Value>) {
        for (key, value) in source {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Read a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Deserialize a value into `T`. Missing keys and JSON nulls yield `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| GalleryError::Session(format!("Invalid value for '{}': {}", key, e))),
        }
    }

    /// All entries, for display.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut session = SessionState::new();
        session.set("sql_query", "SELECT 1");
        assert_eq!(session.get_str("sql_query"), Some("SELECT 1"));
        assert!(session.contains("sql_query"));
        assert!(session.get("missing").is_none());
    }

    #[test]
    fn test_get_as_typed() {
        let mut session = SessionState::new();
        session.set("numbers", json!([1, 2, 3]));
        session.set("nothing", Value::Null);

        let numbers: Option<Vec<u32>> = session.get_as("numbers").unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        let nothing: Option<Vec<u32>> = session.get_as("nothing").unwrap();
        assert!(nothing.is_none());

        let wrong: Result<Option<String>> = session.get_as("numbers");
        assert!(matches!(wrong, Err(GalleryError::Session(_))));
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        assert_ne!(SessionState::new().id(), SessionState::new().id());
    }
}

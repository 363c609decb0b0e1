//! Session memory tools and scenario loading for the travel concierge.

use super::{
    ITINERARY_END_DATE_KEY, ITINERARY_DATETIME_KEY, ITINERARY_INITIALIZED_KEY, ITINERARY_KEY,
    ITINERARY_START_DATE_KEY, SYSTEM_TIME_KEY,
};
use crate::error::{GalleryError, Result};
use crate::session::SessionState;
use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Store a single value under `key`, replacing any previous value.
pub fn memorize(session: &mut SessionState, key: &str, value: &str) -> String {
    session.set(key, value);
    format!("Stored \"{}\": \"{}\"", key, value)
}

/// Append `value` to the list under `key`, skipping duplicates.
pub fn memorize_list(session: &mut SessionState, key: &str, value: &str) -> Result<String> {
    if !session.contains(key) {
        session.set(key, Value::Array(Vec::new()));
    }

    let list = session
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| GalleryError::Session(format!("'{}' does not hold a list", key)))?;

    let item = Value::String(value.to_string());
    if !list.contains(&item) {
        list.push(item);
    }
    Ok(format!("Stored \"{}\": \"{}\"", key, value))
}

/// Remove `value` from the list under `key`, or clear `key` if it holds exactly `value`.
pub fn forget(session: &mut SessionState, key: &str, value: &str) -> Result<String> {
    let clear = match session.get_mut(key) {
        None | Some(Value::Null) => false,
        Some(Value::Array(list)) => {
            list.retain(|item| item.as_str() != Some(value));
            false
        }
        Some(Value::String(current)) if current == value => true,
        Some(_) => {
            return Err(GalleryError::Session(format!(
                "'{}' does not hold \"{}\"",
                key, value
            )))
        }
    };
    if clear {
        session.remove(key);
    }
    Ok(format!("Removed \"{}\": \"{}\"", key, value))
}

/// Seed a session from scenario state. Runs once per session.
///
/// Records the session start time, copies every scenario key, and derives the
/// itinerary date keys when the scenario has an itinerary.
#[instrument(skip(session, source))]
pub fn initialize_session(
    session: &mut SessionState,
    source: &Map<String, Value>,
    now: NaiveDateTime,
) -> Result<()> {
    if !session.contains(SYSTEM_TIME_KEY) {
        session.set(SYSTEM_TIME_KEY, now.format("%Y-%m-%d %H:%M:%S").to_string());
    }

    if session.contains(ITINERARY_INITIALIZED_KEY) {
        debug!("Session already initialized");
        return Ok(());
    }
    session.set(ITINERARY_INITIALIZED_KEY, true);
    session.extend(source);

    let itinerary = match source.get(ITINERARY_KEY) {
        Some(Value::Object(itinerary)) if !itinerary.is_empty() => itinerary,
        _ => return Ok(()),
    };

    let start = itinerary.get("start_date").and_then(Value::as_str).ok_or_else(|| {
        GalleryError::Itinerary("Itinerary has no start_date".to_string())
    })?;
    let end = itinerary
        .get("end_date")
        .and_then(Value::as_str)
        .unwrap_or(start);

    session.set(ITINERARY_START_DATE_KEY, start);
    session.set(ITINERARY_END_DATE_KEY, end);
    session.set(ITINERARY_DATETIME_KEY, start);

    info!("Initialized itinerary from {} to {}", start, end);
    Ok(())
}

/// Read scenario state from a `{"state": {...}}` JSON file.
pub fn load_scenario(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    let mut scenario: Value = serde_json::from_str(&content)?;

    match scenario.get_mut("state").map(Value::take) {
        Some(Value::Object(state)) => Ok(state),
        _ => Err(GalleryError::Itinerary(format!(
            "Scenario {:?} has no \"state\" object",
            path
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::travel::USER_PROFILE_KEY;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_memorize_replaces() {
        let mut session = SessionState::new();
        memorize(&mut session, "seat_preference", "aisle");
        let status = memorize(&mut session, "seat_preference", "window");
        assert_eq!(status, "Stored \"seat_preference\": \"window\"");
        assert_eq!(session.get_str("seat_preference"), Some("window"));
    }

    #[test]
    fn test_memorize_list_deduplicates() {
        let mut session = SessionState::new();
        memorize_list(&mut session, "food", "vegan").unwrap();
        memorize_list(&mut session, "food", "spicy").unwrap();
        memorize_list(&mut session, "food", "vegan").unwrap();
        assert_eq!(session.get("food"), Some(&json!(["vegan", "spicy"])));

        session.set("name", "Ana");
        assert!(matches!(
            memorize_list(&mut session, "name", "x"),
            Err(GalleryError::Session(_))
        ));
    }

    #[test]
    fn test_forget() {
        let mut session = SessionState::new();
        memorize_list(&mut session, "food", "vegan").unwrap();
        memorize_list(&mut session, "food", "spicy").unwrap();

        let status = forget(&mut session, "food", "vegan").unwrap();
        assert_eq!(status, "Removed \"food\": \"vegan\"");
        assert_eq!(session.get("food"), Some(&json!(["spicy"])));

        memorize(&mut session, "seat", "aisle");
        forget(&mut session, "seat", "aisle").unwrap();
        assert!(!session.contains("seat"));

        assert!(forget(&mut session, "unknown", "x").is_ok());
    }

    #[test]
    fn test_initialize_session_once() {
        let source = json!({
            USER_PROFILE_KEY: {"home": {"address": "1 Main St"}},
            ITINERARY_KEY: {"start_date": "2025-06-15", "end_date": "2025-06-17", "days": []}
        });
        let source = source.as_object().unwrap();

        let mut session = SessionState::new();
        initialize_session(&mut session, source, now()).unwrap();

        assert_eq!(session.get_str(SYSTEM_TIME_KEY), Some("2025-06-01 09:00:00"));
        assert_eq!(session.get_str(ITINERARY_START_DATE_KEY), Some("2025-06-15"));
        assert_eq!(session.get_str(ITINERARY_END_DATE_KEY), Some("2025-06-17"));
        assert_eq!(session.get_str(ITINERARY_DATETIME_KEY), Some("2025-06-15"));
        assert!(session.contains(USER_PROFILE_KEY));

        session.set(ITINERARY_DATETIME_KEY, "2025-06-16 10:00");
        initialize_session(&mut session, source, now()).unwrap();
        assert_eq!(session.get_str(ITINERARY_DATETIME_KEY), Some("2025-06-16 10:00"));
    }

    #[test]
    fn test_initialize_without_itinerary() {
        let mut session = SessionState::new();
        initialize_session(&mut session, &Map::new(), now()).unwrap();
        assert!(session.contains(SYSTEM_TIME_KEY));
        assert!(!session.contains(ITINERARY_START_DATE_KEY));
    }

    #[test]
    fn test_load_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, r#"{"state": {"user_profile": {"home": {}}, "itinerary": {}}}"#).unwrap();

        let state = load_scenario(&path).unwrap();
        assert!(state.contains_key("user_profile"));

        std::fs::write(&path, r#"{"user_profile": {}}"#).unwrap();
        assert!(matches!(load_scenario(&path), Err(GalleryError::Itinerary(_))));
    }
}

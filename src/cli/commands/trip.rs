//! Trip command implementation.

use crate::cli::{Output, TripAction};
use crate::config::{Prompts, Settings};
use crate::session::SessionState;
use crate::travel::{self, ITINERARY_DATETIME_KEY};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Run the trip command.
pub fn run_trip(action: &TripAction, settings: Settings) -> Result<()> {
    match action {
        TripAction::Segment { scenario, at } => {
            let session = travel_session(&settings, scenario.as_deref(), at.as_deref())?;

            match travel::current_segment(&session)? {
                Some((current, segment)) => {
                    Output::header(&format!("Current leg at {}", current));
                    Output::kv("From", &segment.travel_from);
                    Output::kv("Leave by", &segment.leave_by);
                    Output::kv("To", &segment.travel_to);
                    Output::kv("Arrive by", &segment.arrive_by);
                }
                None => Output::warning("The scenario has no itinerary."),
            }
        }

        TripAction::Brief { scenario, at } => {
            let session = travel_session(&settings, scenario.as_deref(), at.as_deref())?;
            let prompts = Prompts::load(
                settings.prompts.custom_dir.as_deref(),
                Some(&settings.prompts.variables),
            )?;
            println!("{}", travel::transit_instruction(&session, &prompts)?);
        }
    }

    Ok(())
}

/// Build a travel session from a scenario file and an optional current time.
pub(crate) fn travel_session(
    settings: &Settings,
    scenario: Option<&str>,
    at: Option<&str>,
) -> Result<SessionState> {
    let path: PathBuf = match scenario {
        Some(path) => Settings::expand_path(path),
        None => settings.scenario_path().context(
            "No scenario given. Pass --scenario or set travel.scenario_path in the config",
        )?,
    };

    let state = travel::load_scenario(&path)
        .with_context(|| format!("Failed to load scenario {}", path.display()))?;

    let mut session = SessionState::new();
    travel::initialize_session(&mut session, &state, chrono::Local::now().naive_local())?;

    if let Some(at) = at {
        // Fail on a malformed time before it reaches the session
        travel::parse_current_datetime(at)?;
        session.set(ITINERARY_DATETIME_KEY, at);
    }

    Ok(session)
}

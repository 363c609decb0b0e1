//! Transit-coordination instruction for the in-trip agent.

use super::itinerary::{Itinerary, Profile};
use super::segment::{find_segment, parse_current_datetime, Segment};
use super::{ITINERARY_DATETIME_KEY, ITINERARY_KEY, SYSTEM_TIME_KEY, USER_PROFILE_KEY};
use crate::config::Prompts;
use crate::error::{GalleryError, Result};
use crate::session::SessionState;
use std::collections::HashMap;
use tracing::debug;

/// The segment for the session's itinerary at the session's current time.
///
/// Returns `None` when the session holds no itinerary.
pub fn current_segment(session: &SessionState) -> Result<Option<(String, Segment)>> {
    let itinerary: Itinerary = match session.get_as(ITINERARY_KEY)? {
        Some(itinerary) => itinerary,
        None => return Ok(None),
    };
    let profile: Profile = session.get_as(USER_PROFILE_KEY)?.unwrap_or_default();

    let current = session
        .get_str(ITINERARY_DATETIME_KEY)
        .or_else(|| session.get_str(SYSTEM_TIME_KEY))
        .ok_or_else(|| {
            GalleryError::Session(format!(
                "Neither '{}' nor '{}' is set",
                ITINERARY_DATETIME_KEY, SYSTEM_TIME_KEY
            ))
        })?
        .to_string();

    let segment = find_segment(&profile, &itinerary, parse_current_datetime(&current)?)?;
    Ok(Some((current, segment)))
}

/// Build the instruction for the in-trip agent from the session state.
pub fn transit_instruction(session: &SessionState, prompts: &Prompts) -> Result<String> {
    let Some((current, segment)) = current_segment(session)? else {
        debug!("No itinerary in session");
        return Ok(prompts.travel.need_itinerary.clone());
    };

    let mut vars = HashMap::new();
    vars.insert("current_datetime".to_string(), current);
    vars.insert("travel_from".to_string(), segment.travel_from);
    vars.insert("travel_to".to_string(), segment.travel_to);
    vars.insert("leave_by".to_string(), segment.leave_by);
    vars.insert("arrive_by".to_string(), segment.arrive_by);

    Ok(prompts.render_with_custom(&prompts.travel.logistics, &vars))
}

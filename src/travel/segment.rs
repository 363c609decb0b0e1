//! Finding the current leg of a trip.

use super::itinerary::{parse_event_time, Event, HomeEvent, Itinerary, Profile};
use crate::error::{GalleryError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const ANY_TIME: &str = "any time";
pub const LOCAL_REGION: &str = "Local in the region";
pub const NO_MOVEMENT: &str = "No movement required";
const AS_SOON_AS_POSSIBLE: &str = "as soon as possible";
const DEFAULT_MODE: &str = "transit";
const DEFAULT_HOME: &str = "home";

/// Where the traveler goes next and the times that bound the move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub travel_from: String,
    pub travel_to: String,
    pub leave_by: String,
    pub arrive_by: String,
}

/// Either the profile's home or an itinerary event.
#[derive(Clone, Copy)]
enum Stop<'a> {
    Home(&'a HomeEvent),
    Event(&'a Event),
}

impl<'a> Stop<'a> {
    /// Description of the place and when the traveler can leave it.
    fn as_origin(self) -> (String, String) {
        match self {
            Stop::Home(home) | Stop::Event(Event::Home(home)) => {
                (format!("{} from {}", mode(home), address(home)), ANY_TIME.to_string())
            }
            Stop::Event(Event::Flight(f)) => (
                airport(f.arrival_airport.as_deref()),
                or_default(f.arrival_time.as_deref(), ANY_TIME),
            ),
            Stop::Event(Event::Hotel(h)) => (
                place(h.description.as_deref(), h.address.as_deref()),
                ANY_TIME.to_string(),
            ),
            Stop::Event(Event::Visit(v)) => (
                place(v.description.as_deref(), v.address.as_deref()),
                or_default(v.end_time.as_deref(), ANY_TIME),
            ),
            Stop::Event(Event::Other) => (LOCAL_REGION.to_string(), ANY_TIME.to_string()),
        }
    }

    /// Description of the place and when the traveler must be there.
    fn as_destination(self) -> (String, String) {
        match self {
            Stop::Home(home) | Stop::Event(Event::Home(home)) => {
                (format!("{} to {}", mode(home), address(home)), ANY_TIME.to_string())
            }
            Stop::Event(Event::Flight(f)) => {
                let arrive_by = match f.boarding_time.as_deref().or(f.departure_time.as_deref()) {
                    Some(time) => format!("An hour before {}", time),
                    None => ANY_TIME.to_string(),
                };
                (airport(f.departure_airport.as_deref()), arrive_by)
            }
            Stop::Event(Event::Hotel(h)) => (
                place(h.description.as_deref(), h.address.as_deref()),
                ANY_TIME.to_string(),
            ),
            Stop::Event(Event::Visit(v)) => (
                place(v.description.as_deref(), v.address.as_deref()),
                or_default(v.start_time.as_deref(), ANY_TIME),
            ),
            Stop::Event(Event::Other) => (LOCAL_REGION.to_string(), AS_SOON_AS_POSSIBLE.to_string()),
        }
    }
}

fn mode(home: &HomeEvent) -> &str {
    home.local_prefer_mode.as_deref().unwrap_or(DEFAULT_MODE)
}

fn address(home: &HomeEvent) -> &str {
    home.address.as_deref().unwrap_or(DEFAULT_HOME)
}

fn airport(code: Option<&str>) -> String {
    match code {
        Some(code) => format!("{} Airport", code),
        None => LOCAL_REGION.to_string(),
    }
}

fn place(description: Option<&str>, address: Option<&str>) -> String {
    match (description, address) {
        (Some(d), Some(a)) => format!("{} {}", d, a),
        (Some(s), None) | (None, Some(s)) => s.to_string(),
        (None, None) => LOCAL_REGION.to_string(),
    }
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}

/// Find the leg the traveler is on at `now`.
///
/// The destination is the first event whose scheduled instant (day date plus event
/// time) is at or after `now`; the origin is the event before it, or the profile's
/// home for the first event. Events without a time are scheduled at the current time
/// of day on their date. When every event is in the past the traveler stays put.
#[instrument(skip(profile, itinerary), fields(days = itinerary.days.len()))]
pub fn find_segment(profile: &Profile, itinerary: &Itinerary, now: NaiveDateTime) -> Result<Segment> {
    let mut origin = Stop::Home(&profile.home);

    for day in &itinerary.days {
        for event in &day.events {
            let time = match event.scheduled_time() {
                Some(time) => parse_event_time(time)?,
                None => now.time(),
            };
            if day.date.and_time(time) >= now {
                debug!("Next event is a {} on {}", event.kind(), day.date);
                let (travel_from, leave_by) = origin.as_origin();
                let (travel_to, arrive_by) = Stop::Event(event).as_destination();
                return Ok(Segment {
                    travel_from,
                    travel_to,
                    leave_by,
                    arrive_by,
                });
            }
            origin = Stop::Event(event);
        }
    }

    let (travel_from, _) = origin.as_origin();
    Ok(Segment {
        travel_from,
        travel_to: NO_MOVEMENT.to_string(),
        leave_by: NO_MOVEMENT.to_string(),
        arrive_by: NO_MOVEMENT.to_string(),
    })
}

/// Parse a timestamp like `2025-06-15 08:00`, `2025-06-15T08:00:00` or `2025-06-15`.
pub fn parse_current_datetime(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];

    if let Some(parsed) = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Ok(parsed);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| GalleryError::InvalidInput(format!("Unrecognized date/time '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> Profile {
        serde_json::from_value(json!({
            "home": {"event_type": "home", "address": "6420 Sequence Dr, San Diego", "local_prefer_mode": "drive"}
        }))
        .unwrap()
    }

    fn itinerary() -> Itinerary {
        serde_json::from_value(json!({
            "trip_name": "Seattle weekend",
            "start_date": "2025-06-15",
            "end_date": "2025-06-16",
            "days": [
                {"day_number": 1, "date": "2025-06-15", "events": [
                    {"event_type": "flight", "departure_airport": "SAN", "arrival_airport": "SEA",
                     "boarding_time": "07:30", "departure_time": "08:00", "arrival_time": "10:30"},
                    {"event_type": "visit", "description": "Pike Place Market", "address": "85 Pike St",
                     "start_time": "12:00", "end_time": "14:00"},
                    {"event_type": "hotel", "description": "Moore Hotel", "address": "1926 2nd Ave",
                     "check_in_time": "16:00"}
                ]},
                {"day_number": 2, "date": "2025-06-16", "events": [
                    {"event_type": "flight", "departure_airport": "SEA", "arrival_airport": "SAN",
                     "boarding_time": "18:00", "arrival_time": "20:45"},
                    {"event_type": "home", "address": "6420 Sequence Dr, San Diego", "local_prefer_mode": "drive"}
                ]}
            ]
        }))
        .unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        parse_current_datetime(s).unwrap()
    }

    #[test]
    fn test_single_flight_starts_from_home() {
        let itinerary: Itinerary = serde_json::from_value(json!({
            "days": [{"date": "2025-06-15", "events": [
                {"event_type": "flight", "departure_airport": "SAN", "boarding_time": "07:30"}
            ]}]
        }))
        .unwrap();

        let segment = find_segment(&profile(), &itinerary, at("2025-06-15 05:00")).unwrap();
        assert_eq!(
            segment,
            Segment {
                travel_from: "drive from 6420 Sequence Dr, San Diego".to_string(),
                travel_to: "SAN Airport".to_string(),
                leave_by: "any time".to_string(),
                arrive_by: "An hour before 07:30".to_string(),
            }
        );
    }

    #[test]
    fn test_everything_in_the_past_needs_no_movement() {
        let segment = find_segment(&profile(), &itinerary(), at("2025-06-17 09:00")).unwrap();
        assert_eq!(segment.travel_to, NO_MOVEMENT);
        assert_eq!(segment.leave_by, NO_MOVEMENT);
        assert_eq!(segment.arrive_by, NO_MOVEMENT);
        assert_eq!(segment.travel_from, "drive from 6420 Sequence Dr, San Diego");
    }

    #[test]
    fn test_visit_to_hotel() {
        let segment = find_segment(&profile(), &itinerary(), at("2025-06-15 13:00")).unwrap();
        assert_eq!(segment.travel_from, "Pike Place Market 85 Pike St");
        assert_eq!(segment.leave_by, "14:00");
        assert_eq!(segment.travel_to, "Moore Hotel 1926 2nd Ave");
        assert_eq!(segment.arrive_by, "any time");
    }

    #[test]
    fn test_flight_arrival_to_visit() {
        let segment = find_segment(&profile(), &itinerary(), at("2025-06-15 09:00")).unwrap();
        assert_eq!(segment.travel_from, "SEA Airport");
        assert_eq!(segment.leave_by, "10:30");
        assert_eq!(segment.travel_to, "Pike Place Market 85 Pike St");
        assert_eq!(segment.arrive_by, "12:00");
    }

    #[test]
    fn test_combined_instant_crosses_days() {
        // An earlier time of day on a later date is still ahead of an evening "now"
        let segment = find_segment(&profile(), &itinerary(), at("2025-06-15 20:00")).unwrap();
        assert_eq!(segment.travel_from, "Moore Hotel 1926 2nd Ave");
        assert_eq!(segment.travel_to, "SEA Airport");
        assert_eq!(segment.arrive_by, "An hour before 18:00");
    }

    #[test]
    fn test_event_at_exactly_now_is_next() {
        let segment = find_segment(&profile(), &itinerary(), at("2025-06-15 12:00")).unwrap();
        assert_eq!(segment.travel_to, "Pike Place Market 85 Pike St");
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let itinerary: Itinerary = serde_json::from_value(json!({
            "days": [{"date": "2025-06-15", "events": [
                {"event_type": "hotel"},
                {"event_type": "ferry"}
            ]}]
        }))
        .unwrap();

        let segment = find_segment(&Profile::default(), &itinerary, at("2025-06-15 10:00")).unwrap();
        assert_eq!(segment.travel_from, "transit from home");
        assert_eq!(segment.travel_to, LOCAL_REGION);

        let inputs = (Profile::default(), itinerary);
        let before = inputs.clone();
        let segment = find_segment(&inputs.0, &inputs.1, at("2025-06-15 10:00")).unwrap();
        assert_eq!(segment.travel_to, LOCAL_REGION);
        assert_eq!(inputs, before);
    }

    #[test]
    fn test_bad_event_time_is_an_error() {
        let itinerary: Itinerary = serde_json::from_value(json!({
            "days": [{"date": "2025-06-15", "events": [
                {"event_type": "visit", "start_time": "noon"}
            ]}]
        }))
        .unwrap();
        let result = find_segment(&profile(), &itinerary, at("2025-06-15 10:00"));
        assert!(matches!(result, Err(GalleryError::Itinerary(_))));
    }

    #[test]
    fn test_parse_current_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(at("2025-06-15 08:00"), expected);
        assert_eq!(at("2025-06-15 08:00:00"), expected);
        assert_eq!(at("2025-06-15T08:00:00"), expected);
        assert_eq!(at("2025-06-15").date(), expected.date());
        assert!(matches!(
            parse_current_datetime("tomorrow"),
            Err(GalleryError::InvalidInput(_))
        ));
    }
}

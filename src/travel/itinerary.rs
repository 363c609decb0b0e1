//! Itinerary and profile data model.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GalleryError, Result};

/// A trip: ordered days, each with ordered events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Itinerary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub days: Vec<Day>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Day {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_number: Option<u32>,
    pub date: NaiveDate,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One itinerary entry, discriminated by its `event_type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "lowercase")]
pub enum Event {
    Flight(FlightEvent),
    Hotel(HotelEvent),
    Visit(VisitEvent),
    Home(HomeEvent),
    /// Any event type this crate does not know about.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlightEvent {
    pub description: Option<String>,
    pub flight_number: Option<String>,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,
    pub boarding_time: Option<String>,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub seat_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HotelEvent {
    pub description: Option<String>,
    pub address: Option<String>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisitEvent {
    pub description: Option<String>,
    pub address: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HomeEvent {
    pub address: Option<String>,
    pub local_prefer_mode: Option<String>,
}

/// Traveler profile. Only `home` is interpreted; other fields are kept as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default)]
    pub home: HomeEvent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Time the traveler has to be at this event, if it has one.
    pub fn scheduled_time(&self) -> Option<&str> {
        match self {
            Event::Flight(f) => f.boarding_time.as_deref().or(f.departure_time.as_deref()),
            Event::Hotel(h) => h.check_in_time.as_deref(),
            Event::Visit(v) => v.start_time.as_deref(),
            Event::Home(_) | Event::Other => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Flight(_) => "flight",
            Event::Hotel(_) => "hotel",
            Event::Visit(_) => "visit",
            Event::Home(_) => "home",
            Event::Other => "other",
        }
    }
}

/// Parse an event time such as `09:30` or `09:30:00`.
pub fn parse_event_time(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| GalleryError::Itinerary(format!("Invalid event time '{}'", value)))
}

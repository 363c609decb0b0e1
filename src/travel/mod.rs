//! Travel concierge: itinerary model, current-leg lookup, session memory and the
//! transit instruction given to the in-trip agent.

mod itinerary;
mod memory;
mod segment;
mod transit;

pub use itinerary::{
    parse_event_time, Day, Event, FlightEvent, HomeEvent, HotelEvent, Itinerary, Profile,
    VisitEvent,
};
pub use memory::{forget, initialize_session, load_scenario, memorize, memorize_list};
pub use segment::{find_segment, parse_current_datetime, Segment, ANY_TIME, LOCAL_REGION, NO_MOVEMENT};
pub use transit::{current_segment, transit_instruction};

/// Session key for the traveler profile.
pub const USER_PROFILE_KEY: &str = "user_profile";
/// Session key for the itinerary.
pub const ITINERARY_KEY: &str = "itinerary";
/// Session key for the wall-clock time the session started.
pub const SYSTEM_TIME_KEY: &str = "_time";
/// Marks a session whose scenario state has been loaded.
pub const ITINERARY_INITIALIZED_KEY: &str = "_itin_initialized";
pub const ITINERARY_START_DATE_KEY: &str = "itinerary_start_date";
pub const ITINERARY_END_DATE_KEY: &str = "itinerary_end_date";
/// Session key for the simulated current time within the trip.
pub const ITINERARY_DATETIME_KEY: &str = "itinerary_datetime";

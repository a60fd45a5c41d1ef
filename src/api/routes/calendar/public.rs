//! Public types for the calendar API
use serde::Deserialize;

use crate::calendar::EventColor;

pub use crate::calendar::{CalendarItem, DisplayItem, Etiquette, UpsertItem};

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    // Use HTML form syntax "?hide=rose&hide=violet"
    #[serde(default)]
    pub hide: Vec<EventColor>,
}

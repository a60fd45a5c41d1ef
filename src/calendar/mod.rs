//! Calendar items: the persisted model, the display mapping used by
//! the calendar UI, and owner-scoped storage.

pub mod db;
pub mod error;
pub mod mapper;
pub mod models;
pub mod preferences;
pub mod time;

pub use error::CalendarError;
pub use mapper::{from_display, to_display};
pub use models::{
    CalendarItem, Category, DisplayItem, EventColor, ItemFilter, ItemPatch, NewItem, UpsertItem,
};
pub use preferences::{ETIQUETTES, Etiquette, ViewPreferences};

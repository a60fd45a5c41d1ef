use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Determines how `start` and `end` of an item are interpreted. For an
/// event they are the displayed span. For a task `start` is the
/// reminder time and `end` is the due time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Event,
    Task,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Event => "event",
            Category::Task => "task",
        }
    }
}

// Anything that isn't a task is treated as an event so unexpected
// values in storage never cause rows to be dropped
impl From<&str> for Category {
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("task") {
            Category::Task
        } else {
            Category::Event
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed palette a calendar item can be colored with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventColor {
    Blue,
    Orange,
    Violet,
    Rose,
    Emerald,
}

impl EventColor {
    pub const ALL: [EventColor; 5] = [
        EventColor::Blue,
        EventColor::Orange,
        EventColor::Violet,
        EventColor::Rose,
        EventColor::Emerald,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventColor::Blue => "blue",
            EventColor::Orange => "orange",
            EventColor::Violet => "violet",
            EventColor::Rose => "rose",
            EventColor::Emerald => "emerald",
        }
    }

    /// Returns `None` for anything outside of the palette.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl FromStr for EventColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown color `{}`", s))
    }
}

impl fmt::Display for EventColor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar item as it is persisted. Timestamps are always UTC.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalendarItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Category,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(rename = "allDay")]
    pub all_day: bool,
    // Kept as the raw stored value, the palette is enforced when
    // mapping for display
    pub color: Option<String>,
    pub created_by: String,
}

impl CalendarItem {
    pub fn is_task(&self) -> bool {
        self.category == Category::Task
    }
}

/// The shape the calendar UI renders. For tasks the span is derived
/// from the due time and is never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "allDay", default)]
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<EventColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<DateTime<Utc>>,
}

/// Storage payload for an upsert. Without an `id` a new item is
/// created, otherwise the owned item with that id is replaced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "allDay", default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<EventColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// A validated item ready to be inserted on behalf of an owner.
#[derive(Clone, Debug, PartialEq)]
pub struct NewItem {
    pub category: Category,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub color: Option<EventColor>,
}

/// A partial update. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub category: Option<Category>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub color: Option<EventColor>,
    pub all_day: Option<bool>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }
}

/// Inclusive range filter used when reading an owner's items.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub only_tasks: bool,
}

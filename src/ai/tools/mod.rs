//! Calendar tools the assistant can call. Each tool is bound to one
//! owner and that owner's timezone when it is constructed.

mod args;

pub mod read_calendar;
pub use read_calendar::ReadCalendarTool;

pub mod create_event;
pub use create_event::CreateEventTool;

pub mod update_event;
pub use update_event::UpdateEventTool;

use chrono_tz::Tz;
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::ai::permissions::{CREATE_EVENT, PromptVariant, READ_CALENDAR, UPDATE_EVENT};
use crate::calendar::time::to_tool_timestamp;
use crate::calendar::{CalendarItem, Category, EventColor};
use crate::openai::BoxedToolCall;

/// How an item is shown to the model. Times carry the user's offset.
#[derive(Debug, Serialize)]
pub struct ToolItem {
    pub id: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<EventColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "allDay")]
    pub all_day: bool,
}

impl ToolItem {
    pub fn new(item: &CalendarItem, tz: Tz) -> Self {
        Self {
            id: item.id.clone(),
            category: item.category,
            title: item.title.clone(),
            description: item.description.clone(),
            color: item.color.as_deref().and_then(EventColor::parse),
            location: item.location.clone(),
            start: item.start.map(|at| to_tool_timestamp(at, tz)),
            end: item.end.map(|at| to_tool_timestamp(at, tz)),
            all_day: item.all_day,
        }
    }
}

/// The tools permitted by `variant`, bound to `owner_id`.
pub fn calendar_tools(
    db: &Connection,
    owner_id: &str,
    tz: Tz,
    variant: PromptVariant,
) -> Vec<BoxedToolCall> {
    let mut tools: Vec<BoxedToolCall> = Vec::new();
    for name in variant.allowed_tools() {
        match *name {
            READ_CALENDAR => tools.push(Box::new(ReadCalendarTool::new(db, owner_id, tz))),
            CREATE_EVENT => tools.push(Box::new(CreateEventTool::new(db, owner_id, tz))),
            UPDATE_EVENT => tools.push(Box::new(UpdateEventTool::new(db, owner_id, tz))),
            other => tracing::warn!("No tool named {}", other),
        }
    }
    tools
}

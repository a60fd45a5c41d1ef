use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_rusqlite::Connection;

use super::ToolItem;
use super::args::{
    parse_args, parse_category, parse_color, parse_timestamp, parse_title, schema_error,
};
use crate::ai::permissions::CREATE_EVENT;
use crate::calendar::db::insert_items;
use crate::calendar::{CalendarError, Category, EventColor, NewItem};
use crate::openai::{Function, Parameters, ToolCall, ToolType};

pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateEventArgs {
    // One event object or an array of them
    events: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct EventInput {
    #[serde(rename = "type")]
    category: String,
    title: String,
    start: String,
    end: String,
    description: Option<String>,
    location: Option<String>,
    color: Option<String>,
    all_day: Option<bool>,
}

/// Prefix the field named in a per-event error with the event's
/// position in the batch.
fn at_index(idx: usize, err: CalendarError) -> CalendarError {
    match err {
        CalendarError::MissingField(field) => {
            CalendarError::MissingField(format!("events[{}].{}", idx, field))
        }
        CalendarError::Validation { field, reason } => CalendarError::Validation {
            field: format!("events[{}].{}", idx, field),
            reason,
        },
        other => other,
    }
}

fn parse_event(value: Value, tz: Tz) -> Result<NewItem, CalendarError> {
    let input: EventInput =
        serde_json::from_value(value).map_err(|e| schema_error(&e.to_string()))?;

    let category = parse_category("type", &input.category)?;
    let title = parse_title("title", &input.title)?;
    let start = parse_timestamp("start", &input.start, tz)?;
    let end = parse_timestamp("end", &input.end, tz)?;
    let color = input
        .color
        .map(|c| parse_color("color", &c))
        .transpose()?;
    if category == Category::Event && end <= start {
        return Err(CalendarError::invalid("end", "an event must end after it starts"));
    }

    Ok(NewItem {
        category,
        title,
        description: input.description.filter(|s| !s.trim().is_empty()),
        location: input.location.filter(|s| !s.trim().is_empty()),
        start,
        end,
        all_day: category == Category::Event && input.all_day.unwrap_or(false),
        color,
    })
}

fn parse_events(events: Value, tz: Tz) -> Result<Vec<NewItem>, CalendarError> {
    let events = match events {
        Value::Array(events) => events,
        Value::Object(_) => vec![events],
        _ => {
            return Err(CalendarError::invalid(
                "events",
                "expected an event object or an array of them",
            ));
        }
    };
    if events.is_empty() || events.len() > MAX_BATCH_SIZE {
        return Err(CalendarError::invalid(
            "events",
            format!(
                "must contain between 1 and {} items, got {}",
                MAX_BATCH_SIZE,
                events.len()
            ),
        ));
    }

    events
        .into_iter()
        .enumerate()
        .map(|(idx, event)| parse_event(event, tz).map_err(|e| at_index(idx, e)))
        .collect()
}

#[derive(Serialize)]
pub struct CreateEventTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    db: Connection,
    #[serde(skip)]
    owner_id: String,
    #[serde(skip)]
    tz: Tz,
}

impl CreateEventTool {
    pub fn new(db: &Connection, owner_id: &str, tz: Tz) -> Self {
        let event = json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["event", "task"]},
                "title": {"type": "string", "minLength": 1, "maxLength": 100},
                "start": {
                    "type": "string",
                    "description": "ISO 8601 date-time with UTC offset. For a task this is the reminder time."
                },
                "end": {
                    "type": "string",
                    "description": "ISO 8601 date-time with UTC offset. For a task this is the due time."
                },
                "description": {"type": "string"},
                "location": {"type": "string"},
                "color": {"type": "string", "enum": EventColor::ALL.map(|c| c.as_str())},
                "allDay": {"type": "boolean"}
            },
            "required": ["type", "title", "start", "end"],
            "additionalProperties": false
        });
        let function = Function {
            name: String::from(CREATE_EVENT),
            description: String::from(
                "Add events or tasks to the user's calendar. Returns the created items with their ids.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "userId": {
                        "type": "string",
                        "description": "ID of the user whose calendar is changed"
                    },
                    "events": {
                        "description": "A single event or an array of up to 10 events",
                        "anyOf": [
                            event.clone(),
                            {"type": "array", "items": event, "minItems": 1, "maxItems": MAX_BATCH_SIZE}
                        ]
                    }
                }),
                required: vec![String::from("userId"), String::from("events")],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            db: db.clone(),
            owner_id: owner_id.to_string(),
            tz,
        }
    }
}

#[async_trait]
impl ToolCall for CreateEventTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: CreateEventArgs = parse_args(args, &self.owner_id)?;
        let items = parse_events(args.events, self.tz)?;

        let created = insert_items(&self.db, &self.owner_id, items).await?;
        tracing::info!("Created {} calendar item(s) for {}", created.len(), self.owner_id);

        let created: Vec<ToolItem> = created.iter().map(|i| ToolItem::new(i, self.tz)).collect();
        Ok(serde_json::to_string(&created)?)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

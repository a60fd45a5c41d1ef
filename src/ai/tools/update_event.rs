use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_rusqlite::Connection;

use super::ToolItem;
use super::args::{parse_args, parse_category, parse_color, parse_timestamp, parse_title};
use crate::ai::permissions::UPDATE_EVENT;
use crate::calendar::db::update_item;
use crate::calendar::{CalendarError, EventColor, ItemPatch};
use crate::openai::{Function, Parameters, ToolCall, ToolType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct UpdateEventArgs {
    #[serde(alias = "itemId")]
    event_id: String,
    title: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
    start: Option<String>,
    end: Option<String>,
    description: Option<String>,
    location: Option<String>,
    color: Option<String>,
    all_day: Option<bool>,
}

impl UpdateEventArgs {
    fn into_patch(self, tz: Tz) -> Result<(String, ItemPatch), CalendarError> {
        let event_id = self.event_id.trim().to_string();
        if event_id.is_empty() {
            return Err(CalendarError::MissingField(String::from("eventId")));
        }

        let patch = ItemPatch {
            title: self.title.map(|t| parse_title("title", &t)).transpose()?,
            category: self
                .category
                .map(|c| parse_category("type", &c))
                .transpose()?,
            start: self
                .start
                .map(|s| parse_timestamp("start", &s, tz))
                .transpose()?,
            end: self
                .end
                .map(|e| parse_timestamp("end", &e, tz))
                .transpose()?,
            description: self.description,
            location: self.location,
            color: self.color.map(|c| parse_color("color", &c)).transpose()?,
            all_day: self.all_day,
        };

        // Span is checked against the merged item in storage, where the
        // stored category is known

        Ok((event_id, patch))
    }
}

#[derive(Serialize)]
pub struct UpdateEventTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    db: Connection,
    #[serde(skip)]
    owner_id: String,
    #[serde(skip)]
    tz: Tz,
}

impl UpdateEventTool {
    pub fn new(db: &Connection, owner_id: &str, tz: Tz) -> Self {
        let function = Function {
            name: String::from(UPDATE_EVENT),
            description: String::from(
                "Change an existing event or task. Only the fields provided are changed. Use an id returned by read_calendar or create_event.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "userId": {
                        "type": "string",
                        "description": "ID of the user whose calendar is changed"
                    },
                    "eventId": {"type": "string", "description": "ID of the item to change"},
                    "title": {"type": "string", "minLength": 1, "maxLength": 100},
                    "type": {"type": "string", "enum": ["event", "task"]},
                    "start": {
                        "type": "string",
                        "description": "ISO 8601 date-time with UTC offset. New start or reminder time."
                    },
                    "end": {
                        "type": "string",
                        "description": "ISO 8601 date-time with UTC offset. New end or due time."
                    },
                    "description": {"type": "string"},
                    "location": {"type": "string"},
                    "color": {"type": "string", "enum": EventColor::ALL.map(|c| c.as_str())},
                    "allDay": {"type": "boolean"}
                }),
                required: vec![String::from("userId"), String::from("eventId")],
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
impl ToolCall for UpdateEventTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: UpdateEventArgs = parse_args(args, &self.owner_id)?;
        let (event_id, patch) = args.into_patch(self.tz)?;

        let updated = update_item(&self.db, &self.owner_id, &event_id, patch).await?;
        tracing::info!("Updated calendar item {} for {}", updated.id, self.owner_id);

        Ok(serde_json::to_string(&ToolItem::new(&updated, self.tz))?)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

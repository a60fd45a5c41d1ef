use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_rusqlite::Connection;

use super::ToolItem;
use super::args::{parse_args, parse_timestamp};
use crate::ai::permissions::READ_CALENDAR;
use crate::calendar::db::query_items;
use crate::calendar::time::parse_tool_range_end;
use crate::calendar::{CalendarError, ItemFilter};
use crate::openai::{Function, Parameters, ToolCall, ToolType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ReadCalendarArgs {
    from: Option<String>,
    to: Option<String>,
    only_tasks: Option<bool>,
}

#[derive(Serialize)]
pub struct ReadCalendarTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    db: Connection,
    #[serde(skip)]
    owner_id: String,
    #[serde(skip)]
    tz: Tz,
}

impl ReadCalendarTool {
    pub fn new(db: &Connection, owner_id: &str, tz: Tz) -> Self {
        let function = Function {
            name: String::from(READ_CALENDAR),
            description: String::from(
                "List the user's calendar events and tasks, earliest first. Without from/to every item is returned.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "userId": {
                        "type": "string",
                        "description": "ID of the user whose calendar is read"
                    },
                    "from": {
                        "type": "string",
                        "description": "ISO 8601 date or date-time with UTC offset. Only items starting at or after this are returned."
                    },
                    "to": {
                        "type": "string",
                        "description": "ISO 8601 date or date-time with UTC offset. Only items ending at or before this are returned."
                    },
                    "onlyTasks": {
                        "type": "boolean",
                        "description": "Return tasks only"
                    }
                }),
                required: vec![String::from("userId")],
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

    fn filter(&self, args: ReadCalendarArgs) -> Result<ItemFilter, CalendarError> {
        let from = args
            .from
            .map(|v| parse_timestamp("from", &v, self.tz))
            .transpose()?;
        let to = args
            .to
            .map(|v| parse_tool_range_end(&v, self.tz).map_err(|r| CalendarError::invalid("to", r)))
            .transpose()?;
        Ok(ItemFilter {
            from,
            to,
            only_tasks: args.only_tasks.unwrap_or(false),
        })
    }
}

#[async_trait]
impl ToolCall for ReadCalendarTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: ReadCalendarArgs = parse_args(args, &self.owner_id)?;
        let filter = self.filter(args)?;

        // A failed read is reported as an empty calendar
        let items = match query_items(&self.db, &self.owner_id, &filter).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("Reading calendar for {} failed: {}", self.owner_id, e);
                vec![]
            }
        };

        let items: Vec<ToolItem> = items.iter().map(|i| ToolItem::new(i, self.tz)).collect();
        Ok(serde_json::to_string(&items)?)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

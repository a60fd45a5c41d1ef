//! Argument parsing shared by the calendar tools. Arguments arrive as
//! a JSON string written by the model so nothing about them is
//! trusted.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::calendar::{CalendarError, Category, EventColor};
use crate::calendar::time::parse_tool_timestamp;

pub const MAX_TITLE_CHARS: usize = 100;

/// Check the `userId` argument against the owner the tool is bound to
/// and parse the remaining arguments into `T`.
pub fn parse_args<T: DeserializeOwned>(args: &str, owner_id: &str) -> Result<T, CalendarError> {
    let args = if args.trim().is_empty() { "{}" } else { args };
    let value: Value =
        serde_json::from_str(args).map_err(|e| CalendarError::invalid("arguments", e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(CalendarError::invalid("arguments", "expected a JSON object"));
    };

    check_owner(&mut obj, owner_id)?;

    serde_json::from_value(Value::Object(obj)).map_err(|e| schema_error(&e.to_string()))
}

fn check_owner(obj: &mut Map<String, Value>, owner_id: &str) -> Result<(), CalendarError> {
    let alias = obj.remove("ownerId");
    let user_id = obj.remove("userId").or(alias);
    let user_id = match user_id {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Null) | None => return Err(CalendarError::MissingField(String::from("userId"))),
        Some(Value::String(_)) => return Err(CalendarError::MissingField(String::from("userId"))),
        Some(_) => return Err(CalendarError::invalid("userId", "expected a string")),
    };
    if user_id.trim() != owner_id {
        return Err(CalendarError::OwnerMismatch { user_id });
    }
    Ok(())
}

/// Turn a serde error into a typed error naming the offending field
/// when serde mentions one.
pub fn schema_error(msg: &str) -> CalendarError {
    let named = msg
        .split('`')
        .nth(1)
        .filter(|f| !f.is_empty());
    match named {
        Some(field) if msg.starts_with("missing field") => {
            CalendarError::MissingField(field.to_string())
        }
        Some(field) if msg.starts_with("unknown field") => CalendarError::invalid(field, msg),
        _ => CalendarError::invalid("arguments", msg),
    }
}

pub fn parse_category(field: &str, value: &str) -> Result<Category, CalendarError> {
    match value.trim() {
        "event" => Ok(Category::Event),
        "task" => Ok(Category::Task),
        other => Err(CalendarError::invalid(
            field,
            format!("expected \"event\" or \"task\", got {:?}", other),
        )),
    }
}

pub fn parse_color(field: &str, value: &str) -> Result<EventColor, CalendarError> {
    value
        .trim()
        .parse::<EventColor>()
        .map_err(|reason| CalendarError::invalid(field, reason))
}

pub fn parse_title(field: &str, title: &str) -> Result<String, CalendarError> {
    let title = title.trim();
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        return Err(CalendarError::invalid(
            field,
            format!("must be between 1 and {} characters", MAX_TITLE_CHARS),
        ));
    }
    Ok(title.to_string())
}

pub fn parse_timestamp(field: &str, value: &str, tz: Tz) -> Result<DateTime<Utc>, CalendarError> {
    parse_tool_timestamp(value, tz).map_err(|reason| CalendarError::invalid(field, reason))
}

//! System prompts rendered with Handlebars. Only the variables passed
//! in are available to a template, no helpers are registered.

use std::fmt;

use anyhow::{Error, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use handlebars::Handlebars;
use serde::Serialize;

use super::permissions::PromptVariant;
use crate::calendar::time::{format_offset, local_date, utc_offset};

#[derive(Debug)]
pub enum Prompt {
    CalendarAssistant,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const CALENDAR_ASSISTANT_PROMPT: &str = r#"
You are Stuplan, a planning assistant for students. You help {{user_name}} schedule study time, keep track of assignments and deadlines, and spot conflicts in their calendar.

# Context
- Today: {{today}}
- User ID: {{user_id}}
- Timezone: {{timezone}} (UTC offset {{offset}})

# Tools
- read_calendar: list events and tasks. Arguments: userId ({{user_id}}), from and to (optional, inclusive range), onlyTasks (optional).
- create_event: add one event or task, or an array of up to 10. Each needs type ("event" or "task"), title (1-100 characters), start and end. Optional: description, location, color ("blue", "orange", "violet", "rose", "emerald"), allDay.
{{#if allow_update}}
- update_event: change an existing item. Arguments: userId ({{user_id}}), eventId, plus only the fields that change.
{{/if}}

For a task, start is the reminder time and end is the due time. For an event, start must be before end.

# Rules
1. Every date-time you send to a tool must carry the UTC offset of {{timezone}}, for example "{{today}}T15:00:00{{offset}}". Never send a time ending in "Z" unless the offset is +00:00.
2. Call read_calendar before creating{{#if allow_update}} or updating{{/if}} anything so you can find conflicts. When the requested slot is taken, pick the next free slot.
3. Only use ids returned by read_calendar or create_event. Never invent an id.
{{#if allow_update}}
4. When updating, send only the fields the user asked to change.
{{else}}
4. Do NOT modify or update existing events. You can only read and create.
{{/if}}
5. Turn relative dates ("tomorrow", "next Friday") into absolute dates using today's date.
6. If a tool returns an error, tell the user what failed. Don't claim a change was made unless the tool confirmed it.
7. Ask for clarification only when essential details such as the date are missing.

# Style
Be concise: one or two sentences for actions taken. Use 24-hour times (14:30) and dates as YYYY-MM-DD. Report what you did without exposing your reasoning.
"#;

/// Everything the system prompt is parameterized by.
#[derive(Debug, Serialize)]
pub struct PromptContext {
    pub user_id: String,
    pub user_name: String,
    pub timezone: String,
    pub offset: String,
    pub today: String,
    pub allow_update: bool,
}

impl PromptContext {
    pub fn new(
        user_id: &str,
        user_name: Option<&str>,
        tz: Tz,
        variant: PromptVariant,
        now: DateTime<Utc>,
    ) -> Self {
        let user_name = user_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("the user");
        Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            timezone: tz.name().to_string(),
            offset: format_offset(utc_offset(tz, now)),
            today: local_date(tz, now),
            allow_update: variant.allows_update(),
        }
    }
}

pub fn templates<'a>() -> Result<Handlebars<'a>, Error> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Output is plain text for the model, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_template_string(
        &Prompt::CalendarAssistant.to_string(),
        CALENDAR_ASSISTANT_PROMPT,
    )?;
    Ok(registry)
}

pub fn system_prompt(context: &PromptContext) -> Result<String, Error> {
    let prompt = templates()?.render(&Prompt::CalendarAssistant.to_string(), context)?;
    Ok(prompt.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::time::resolve_timezone;

    fn now() -> DateTime<Utc> {
        "2025-10-20T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn it_renders_user_context() {
        let tz = resolve_timezone("Africa/Lagos");
        let ctx = PromptContext::new("u1", Some("Ada"), tz, PromptVariant::default(), now());
        let prompt = system_prompt(&ctx).unwrap();

        assert!(prompt.contains("You help Ada"));
        assert!(prompt.contains("User ID: u1"));
        assert!(prompt.contains("Today: 2025-10-20"));
        assert!(prompt.contains("Africa/Lagos (UTC offset +01:00)"));
        assert!(prompt.contains("2025-10-20T15:00:00+01:00"));
    }

    #[test]
    fn it_falls_back_to_a_generic_name() {
        let ctx = PromptContext::new("u1", Some("  "), Tz::UTC, PromptVariant::default(), now());
        assert_eq!(ctx.user_name, "the user");
        let ctx = PromptContext::new("u1", None, Tz::UTC, PromptVariant::default(), now());
        assert!(system_prompt(&ctx).unwrap().contains("You help the user"));
    }

    #[test]
    fn it_describes_update_only_when_permitted() {
        let ctx = PromptContext::new("u1", None, Tz::UTC, PromptVariant::ReadCreate, now());
        let prompt = system_prompt(&ctx).unwrap();
        assert!(!prompt.contains("update_event"));
        assert!(prompt.contains("Do NOT modify or update existing events"));

        let ctx = PromptContext::new("u1", None, Tz::UTC, PromptVariant::ReadCreateUpdate, now());
        let prompt = system_prompt(&ctx).unwrap();
        assert!(prompt.contains("update_event"));
        assert!(!prompt.contains("Do NOT modify"));
    }

    #[test]
    fn it_does_not_escape_user_values() {
        let ctx = PromptContext::new("u1", Some("O'Brien & Co"), Tz::UTC, PromptVariant::default(), now());
        assert!(system_prompt(&ctx).unwrap().contains("O'Brien & Co"));
    }
}

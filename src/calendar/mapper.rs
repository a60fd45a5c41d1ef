//! Conversion between persisted rows and the calendar UI's event shape.
//!
//! Tasks are stored with `start` as the reminder time and `end` as the
//! due time, but are displayed as a short marker at the due time. The
//! display span of a task is always derived here and never stored.

use chrono::{DateTime, Duration, Utc};

use super::models::{CalendarItem, Category, DisplayItem, EventColor, UpsertItem};

/// Length of the marker a task is drawn with at its due time.
pub const TASK_DISPLAY_MINUTES: i64 = 30;

/// Length of an event missing its end time.
pub const DEFAULT_EVENT_MINUTES: i64 = 60;

pub const TASK_LABEL: &str = "Task";

/// Map a persisted row to the shape the calendar renders. `now` fills
/// in missing timestamps.
pub fn to_display(row: &CalendarItem, now: DateTime<Utc>) -> DisplayItem {
    let color = row.color.as_deref().and_then(EventColor::parse);
    let title = if row.title.is_empty() {
        String::from("Untitled")
    } else {
        row.title.clone()
    };

    let (start, end, all_day, label, reminder) = match row.category {
        Category::Task => {
            let start = row.end.unwrap_or(now);
            (
                start,
                start + Duration::minutes(TASK_DISPLAY_MINUTES),
                false,
                Some(TASK_LABEL.to_string()),
                row.start,
            )
        }
        Category::Event => {
            let start = row.start.unwrap_or(now);
            let end = row
                .end
                .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_MINUTES));
            (start, end, row.all_day, None, None)
        }
    };

    DisplayItem {
        id: row.id.clone(),
        title,
        description: row.description.clone(),
        start,
        end,
        all_day,
        color,
        label,
        location: row.location.clone(),
        reminder,
    }
}

/// Map a displayed item back to a storage payload. Derived fields
/// (`reminder`, `label`) are dropped and an empty id becomes `None`
/// so the upsert creates a new item.
pub fn from_display(item: &DisplayItem) -> UpsertItem {
    UpsertItem {
        id: Some(item.id.clone()).filter(|id| !id.is_empty()),
        title: item.title.clone(),
        description: item.description.clone(),
        start: item.start,
        end: item.end,
        all_day: Some(item.all_day),
        color: item.color,
        location: item.location.clone(),
        category: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn row(category: Category, start: Option<&str>, end: Option<&str>) -> CalendarItem {
        CalendarItem {
            id: String::from("item-1"),
            title: String::from("History essay"),
            description: Some(String::from("Chapter 3")),
            location: Some(String::from("Library")),
            category,
            start: start.map(utc),
            end: end.map(utc),
            all_day: false,
            color: Some(String::from("violet")),
            created_by: String::from("u1"),
        }
    }

    #[test]
    fn it_displays_tasks_at_due_time() {
        let task = row(
            Category::Task,
            Some("2025-10-20T09:00:00Z"),
            Some("2025-10-24T17:00:00Z"),
        );
        let display = to_display(&task, Utc::now());

        assert_eq!(display.start, utc("2025-10-24T17:00:00Z"));
        assert_eq!(display.end, utc("2025-10-24T17:30:00Z"));
        assert_eq!(display.reminder, Some(utc("2025-10-20T09:00:00Z")));
        assert!(!display.all_day);
        assert_eq!(display.label.as_deref(), Some("Task"));

        let json = serde_json::to_value(&display).unwrap();
        assert_eq!(json["start"], "2025-10-24T17:00:00Z");
        assert_eq!(json["end"], "2025-10-24T17:30:00Z");
        assert_eq!(json["reminder"], "2025-10-20T09:00:00Z");
        assert_eq!(json["allDay"], false);
    }

    #[test]
    fn it_always_gives_tasks_a_thirty_minute_span() {
        let now = utc("2025-03-01T12:00:00Z");
        let cases = [
            row(Category::Task, None, None),
            row(Category::Task, Some("2025-10-20T09:00:00Z"), None),
            row(Category::Task, None, Some("2025-10-24T17:00:00Z")),
            // Reminder after the due time is allowed for tasks
            row(
                Category::Task,
                Some("2025-12-01T00:00:00Z"),
                Some("2025-10-24T17:00:00Z"),
            ),
        ];
        for task in cases.iter() {
            let display = to_display(task, now);
            assert_eq!(display.end - display.start, Duration::minutes(30));
        }
    }

    #[test]
    fn it_forces_all_day_off_for_tasks() {
        let mut task = row(Category::Task, None, Some("2025-10-24T17:00:00Z"));
        task.all_day = true;
        assert!(!to_display(&task, Utc::now()).all_day);
    }

    #[test]
    fn it_falls_back_to_now_for_missing_times() {
        let now = utc("2025-03-01T12:00:00Z");

        let task = row(Category::Task, None, None);
        let display = to_display(&task, now);
        assert_eq!(display.start, now);
        assert_eq!(display.reminder, None);

        let event = row(Category::Event, None, None);
        let display = to_display(&event, now);
        assert_eq!(display.start, now);
        assert_eq!(display.end, now + Duration::minutes(60));
    }

    #[test]
    fn it_displays_events_with_their_stored_span() {
        let mut event = row(
            Category::Event,
            Some("2025-10-24T14:00:00Z"),
            Some("2025-10-24T16:00:00Z"),
        );
        event.all_day = true;
        let display = to_display(&event, Utc::now());

        assert_eq!(display.start, utc("2025-10-24T14:00:00Z"));
        assert_eq!(display.end, utc("2025-10-24T16:00:00Z"));
        assert!(display.all_day);
        assert_eq!(display.label, None);
        assert_eq!(display.reminder, None);
    }

    #[test]
    fn it_drops_colors_outside_the_palette() {
        let mut event = row(Category::Event, Some("2025-10-24T14:00:00Z"), None);
        for color in ["red", "", "BLUE", "#ff0000"] {
            event.color = Some(color.to_string());
            assert_eq!(to_display(&event, Utc::now()).color, None);
        }
        event.color = None;
        assert_eq!(to_display(&event, Utc::now()).color, None);
        event.color = Some(String::from("emerald"));
        assert_eq!(
            to_display(&event, Utc::now()).color,
            Some(EventColor::Emerald)
        );
    }

    #[test]
    fn it_uses_placeholder_for_empty_titles() {
        let mut event = row(Category::Event, None, None);
        event.title = String::new();
        assert_eq!(to_display(&event, Utc::now()).title, "Untitled");
    }

    #[test]
    fn it_round_trips_event_fields() {
        let event = row(
            Category::Event,
            Some("2025-10-24T14:00:00Z"),
            Some("2025-10-24T16:00:00Z"),
        );
        let payload = from_display(&to_display(&event, Utc::now()));

        assert_eq!(payload.id.as_deref(), Some("item-1"));
        assert_eq!(payload.title, event.title);
        assert_eq!(payload.description, event.description);
        assert_eq!(payload.location, event.location);
        assert_eq!(
            payload.color.map(|c| c.as_str().to_string()),
            event.color
        );
        assert_eq!(payload.start, utc("2025-10-24T14:00:00Z"));
        assert_eq!(payload.end, utc("2025-10-24T16:00:00Z"));
    }

    #[test]
    fn it_strips_derived_fields_and_empty_ids() {
        let task = row(
            Category::Task,
            Some("2025-10-20T09:00:00Z"),
            Some("2025-10-24T17:00:00Z"),
        );
        let mut display = to_display(&task, Utc::now());
        display.id = String::new();

        let payload = from_display(&display);
        assert_eq!(payload.id, None);

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("reminder").is_none());
        assert!(json.get("label").is_none());
    }
}

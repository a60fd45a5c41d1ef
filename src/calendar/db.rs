//! Owner-scoped storage of calendar items. Every query filters on
//! `created_by` so an owner can never read or change another owner's
//! items.

use rusqlite::{OptionalExtension, Row, params};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use super::error::CalendarError;
use super::models::{CalendarItem, Category, ItemFilter, ItemPatch, NewItem, UpsertItem};
use super::time::{parse_storage_timestamp, to_storage_precision, to_storage_timestamp};

const SELECT_ITEM: &str = r"
    SELECT id, title, description, location, category, start_at, end_at,
           all_day, color, created_by
    FROM calendar_item
";

const INSERT_ITEM: &str = r"
    INSERT INTO calendar_item
        (id, title, description, location, category, start_at, end_at,
         all_day, color, created_by)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
";

const UPDATE_ITEM: &str = r"
    UPDATE calendar_item
    SET title = ?2, description = ?3, location = ?4, category = ?5,
        start_at = ?6, end_at = ?7, all_day = ?8, color = ?9
    WHERE id = ?1 AND created_by = ?10
";

fn item_from_row(row: &Row) -> rusqlite::Result<CalendarItem> {
    let category: String = row.get(4)?;
    let start: Option<String> = row.get(5)?;
    let end: Option<String> = row.get(6)?;
    Ok(CalendarItem {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        category: Category::from(category.as_str()),
        start: start.as_deref().and_then(parse_storage_timestamp),
        end: end.as_deref().and_then(parse_storage_timestamp),
        all_day: row.get(7)?,
        color: row.get(8)?,
        created_by: row.get(9)?,
    })
}

fn insert_row(conn: &rusqlite::Connection, item: &CalendarItem) -> rusqlite::Result<usize> {
    conn.execute(
        INSERT_ITEM,
        params![
            item.id,
            item.title,
            item.description,
            item.location,
            item.category.as_str(),
            item.start.map(to_storage_timestamp),
            item.end.map(to_storage_timestamp),
            item.all_day,
            item.color,
            item.created_by,
        ],
    )
}

fn update_row(conn: &rusqlite::Connection, item: &CalendarItem) -> rusqlite::Result<usize> {
    conn.execute(
        UPDATE_ITEM,
        params![
            item.id,
            item.title,
            item.description,
            item.location,
            item.category.as_str(),
            item.start.map(to_storage_timestamp),
            item.end.map(to_storage_timestamp),
            item.all_day,
            item.color,
            item.created_by,
        ],
    )
}

fn find_row(
    conn: &rusqlite::Connection,
    owner_id: &str,
    item_id: &str,
) -> rusqlite::Result<Option<CalendarItem>> {
    conn.query_row(
        &format!("{} WHERE id = ?1 AND created_by = ?2", SELECT_ITEM),
        params![item_id, owner_id],
        item_from_row,
    )
    .optional()
}

fn validate_title(field: &str, title: &str) -> Result<(), CalendarError> {
    if title.trim().is_empty() {
        return Err(CalendarError::invalid(field, "must not be empty"));
    }
    Ok(())
}

/// Events must end after they start. Tasks have no ordering
/// constraint between reminder and due time.
fn validate_span(item: &CalendarItem) -> Result<(), CalendarError> {
    if let (Category::Event, Some(start), Some(end)) = (item.category, item.start, item.end) {
        if end <= start {
            return Err(CalendarError::invalid("end", "an event must end after it starts"));
        }
    }
    Ok(())
}

/// Apply a partial update. Fields left as `None` keep their value.
fn apply_patch(item: &mut CalendarItem, patch: ItemPatch) {
    if let Some(title) = patch.title {
        item.title = title;
    }
    if let Some(category) = patch.category {
        item.category = category;
    }
    if let Some(start) = patch.start {
        item.start = Some(to_storage_precision(start));
    }
    if let Some(end) = patch.end {
        item.end = Some(to_storage_precision(end));
    }
    if let Some(description) = patch.description {
        item.description = Some(description);
    }
    if let Some(location) = patch.location {
        item.location = Some(location);
    }
    if let Some(color) = patch.color {
        item.color = Some(color.to_string());
    }
    if let Some(all_day) = patch.all_day {
        item.all_day = all_day;
    }
    if item.is_task() {
        item.all_day = false;
    }
}

/// All items owned by `owner_id`, earliest first.
pub async fn list_owned_items(
    db: &Connection,
    owner_id: &str,
) -> Result<Vec<CalendarItem>, CalendarError> {
    query_items(db, owner_id, &ItemFilter::default()).await
}

/// Items owned by `owner_id` matching `filter`. Bounds are inclusive:
/// an item matches when it starts at or after `from` and ends at or
/// before `to`.
pub async fn query_items(
    db: &Connection,
    owner_id: &str,
    filter: &ItemFilter,
) -> Result<Vec<CalendarItem>, CalendarError> {
    let owner = owner_id.to_owned();
    let from = filter.from.map(to_storage_timestamp);
    let to = filter.to.map(to_storage_timestamp);
    let only_tasks = filter.only_tasks;

    let items = db
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                r"{}
                WHERE created_by = ?1
                  AND (?2 IS NULL OR start_at >= ?2)
                  AND (?3 IS NULL OR end_at <= ?3)
                  AND (?4 = 0 OR category = 'task')
                ORDER BY start_at ASC
                ",
                SELECT_ITEM
            ))?;
            let rows = stmt
                .query_map(params![owner, from, to, only_tasks], item_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;

    Ok(items)
}

pub async fn find_owned_item(
    db: &Connection,
    owner_id: &str,
    item_id: &str,
) -> Result<Option<CalendarItem>, CalendarError> {
    let owner = owner_id.to_owned();
    let id = item_id.to_owned();
    let item = db.call(move |conn| Ok(find_row(conn, &owner, &id)?)).await?;
    Ok(item)
}

/// Insert `item` when it has no id, otherwise replace the owned item
/// with that id. Replacing an item that doesn't exist or belongs to
/// someone else is an authorization error and writes nothing.
pub async fn upsert_item(
    db: &Connection,
    owner_id: &str,
    item: UpsertItem,
) -> Result<CalendarItem, CalendarError> {
    validate_title("title", &item.title)?;
    let owner = owner_id.to_owned();

    let result = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing = match &item.id {
                Some(id) => match find_row(&tx, &owner, id)? {
                    Some(existing) => Some(existing),
                    None => return Ok(Err(CalendarError::unauthorized(id.clone()))),
                },
                None => None,
            };

            let category = item
                .category
                .or(existing.as_ref().map(|e| e.category))
                .unwrap_or_default();
            let all_day = match category {
                Category::Task => false,
                Category::Event => item
                    .all_day
                    .or(existing.as_ref().map(|e| e.all_day))
                    .unwrap_or(false),
            };
            let row = CalendarItem {
                id: existing
                    .as_ref()
                    .map(|e| e.id.clone())
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                title: item.title,
                description: item.description,
                location: item.location,
                category,
                start: Some(to_storage_precision(item.start)),
                end: Some(to_storage_precision(item.end)),
                all_day,
                color: item.color.map(|c| c.to_string()),
                created_by: owner,
            };
            if let Err(e) = validate_span(&row) {
                return Ok(Err(e));
            }

            if existing.is_some() {
                update_row(&tx, &row)?;
            } else {
                insert_row(&tx, &row)?;
            }
            tx.commit()?;

            Ok(Ok(row))
        })
        .await??;

    tracing::debug!("Upserted calendar item {}", result.id);
    Ok(result)
}

/// Insert a batch of items for `owner_id` in one transaction.
pub async fn insert_items(
    db: &Connection,
    owner_id: &str,
    items: Vec<NewItem>,
) -> Result<Vec<CalendarItem>, CalendarError> {
    let batch_size = items.len();
    let rows: Vec<CalendarItem> = items
        .into_iter()
        .map(|item| CalendarItem {
            id: Uuid::new_v4().to_string(),
            all_day: item.all_day && item.category == Category::Event,
            title: item.title,
            description: item.description,
            location: item.location,
            category: item.category,
            start: Some(to_storage_precision(item.start)),
            end: Some(to_storage_precision(item.end)),
            color: item.color.map(|c| c.to_string()),
            created_by: owner_id.to_owned(),
        })
        .collect();

    db.call(move |conn| {
        let tx = conn.transaction()?;
        for row in rows.iter() {
            insert_row(&tx, row)?;
        }
        tx.commit()?;
        Ok(rows)
    })
    .await
    .map_err(|e| {
        CalendarError::Backend(format!(
            "failed to create batch of {} item(s): {}",
            batch_size, e
        ))
    })
}

/// Change only the fields set in `patch` on an item owned by
/// `owner_id`. Nothing is written when the item doesn't belong to the
/// owner.
pub async fn update_item(
    db: &Connection,
    owner_id: &str,
    item_id: &str,
    patch: ItemPatch,
) -> Result<CalendarItem, CalendarError> {
    if let Some(title) = &patch.title {
        validate_title("title", title)?;
    }
    let owner = owner_id.to_owned();
    let id = item_id.to_owned();

    let updated = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut item) = find_row(&tx, &owner, &id)? else {
                return Ok(Err(CalendarError::unauthorized(id)));
            };
            if patch.is_empty() {
                return Ok(Ok(item));
            }

            apply_patch(&mut item, patch);
            if let Err(e) = validate_span(&item) {
                return Ok(Err(e));
            }

            update_row(&tx, &item)?;
            tx.commit()?;
            Ok(Ok(item))
        })
        .await??;

    tracing::debug!("Updated calendar item {}", updated.id);
    Ok(updated)
}

/// Delete an owned item. Returns `false` when nothing owned by
/// `owner_id` had that id.
pub async fn delete_item(
    db: &Connection,
    owner_id: &str,
    item_id: &str,
) -> Result<bool, CalendarError> {
    let owner = owner_id.to_owned();
    let id = item_id.to_owned();
    let deleted = db
        .call(move |conn| {
            Ok(conn.execute(
                "DELETE FROM calendar_item WHERE id = ?1 AND created_by = ?2",
                params![id, owner],
            )?)
        })
        .await?;
    Ok(deleted > 0)
}

use anyhow::{Error, Result};
use rusqlite::params;
use tokio_rusqlite::Connection;

use super::error::AssistantError;
use crate::openai::Message;

/// Make sure a session with `session_id` exists and belongs to
/// `owner_id`. A session id already taken by another owner is reported
/// as not found.
pub async fn get_or_create_session(
    db: &Connection,
    session_id: &str,
    owner_id: &str,
) -> Result<(), Error> {
    let id = session_id.to_owned();
    let owner = owner_id.to_owned();
    let session_owner: String = db
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO session (id, owner_id) VALUES (?1, ?2)",
                params![id, owner],
            )?;
            let session_owner = conn.query_row(
                "SELECT owner_id FROM session WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            Ok(session_owner)
        })
        .await?;

    if session_owner != owner_id {
        tracing::warn!("{} tried to use chat session {} of another user", owner_id, session_id);
        return Err(AssistantError::SessionNotFound(session_id.to_string()).into());
    }
    Ok(())
}

/// Append `messages` to a session in one transaction. Either every
/// message is stored or none is.
pub async fn insert_chat_messages(
    db: &Connection,
    session_id: &str,
    messages: &[Message],
) -> Result<usize, Error> {
    let id = session_id.to_owned();
    let rows = messages
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<String>, _>>()?;
    let inserted = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO chat_message (session_id, data) VALUES (?1, ?2)")?;
                for data in rows.iter() {
                    stmt.execute(params![id, data])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await?;
    Ok(inserted)
}

/// All messages of a session in the order they were written. Returns
/// an empty transcript when the session doesn't exist or belongs to
/// someone else.
pub async fn find_chat_session_by_id(
    db: &Connection,
    owner_id: &str,
    session_id: &str,
) -> Result<Vec<Message>, Error> {
    let id = session_id.to_owned();
    let owner = owner_id.to_owned();
    let rows: Vec<String> = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT m.data
                FROM chat_message m
                JOIN session s ON s.id = m.session_id
                WHERE s.id = ?1 AND s.owner_id = ?2
                ORDER BY m.id ASC
                ",
            )?;
            let rows = stmt
                .query_map(params![id, owner], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await?;

    let messages = rows
        .iter()
        .filter_map(|data| {
            serde_json::from_str::<Message>(data)
                .inspect_err(|e| tracing::error!("Skipping unreadable chat message: {}", e))
                .ok()
        })
        .collect();
    Ok(messages)
}

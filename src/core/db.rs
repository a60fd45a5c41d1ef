//! SQLite connection setup and schema migrations.
//!
//! Migrations are applied in order and tracked with `PRAGMA
//! user_version` so running them repeatedly is a no-op.

use anyhow::{Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // 1: calendar items
    r"
    CREATE TABLE IF NOT EXISTS calendar_item (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        location TEXT,
        category TEXT NOT NULL DEFAULT 'event',
        start_at TEXT,
        end_at TEXT,
        all_day INTEGER NOT NULL DEFAULT 0,
        color TEXT,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS calendar_item_owner_start
        ON calendar_item (created_by, start_at);
    ",
    // 2: chat sessions
    r"
    CREATE TABLE IF NOT EXISTS session (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS chat_message (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES session (id) ON DELETE CASCADE,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS chat_message_session
        ON chat_message (session_id);
    ",
];

/// Open the application database stored in the directory `db_path`.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    let path = format!("{}/stuplan.sqlite3", db_path.trim_end_matches('/'));
    let db = Connection::open(path).await?;
    Ok(db)
}

/// Bring the schema up to date. Returns the resulting schema version.
pub fn migrate_db(conn: &mut SyncConnection) -> rusqlite::Result<usize> {
    let current: usize = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, migration) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = idx + 1;
        tracing::info!("Applying db migration {}", version);
        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(MIGRATIONS.len())
}

/// Open an in-memory database with the full schema applied. Used by
/// tests and anything that needs a throwaway store.
pub async fn memory_db() -> Result<Connection, Error> {
    let db = Connection::open_in_memory().await?;
    db.call(|conn| {
        migrate_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

use rusqlite::Connection;

use crate::error::Result;

/// Initialise the response cache and attachment tables.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_responses_table(conn)?;
    create_attachments_table(conn)?;
    Ok(())
}

/// One row per dispatched assistant query. `response` stays NULL until the
/// answer (or the failure text) arrives and is never overwritten after that.
fn create_responses_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS assistant_responses (
            message_id    TEXT PRIMARY KEY,
            response      TEXT,
            processed_at  TEXT NOT NULL,
            answered_at   TEXT
        );",
    )?;
    Ok(())
}

/// Uploaded files, looked up by display name. Names are not unique; the
/// earliest upload wins.
fn create_attachments_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS attachments (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL,
            url          TEXT NOT NULL,
            size_bytes   INTEGER,
            uploaded_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attachments_name
            ON attachments(name);",
    )?;
    Ok(())
}

use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, instrument};
use zani_assistant::{CacheError, ResponseCache};
use zani_core::types::MessageId;

use crate::error::{Result, StoreError};

/// Response cache persisted in `assistant_responses`.
///
/// Survives restarts, so a message answered once is never sent to the query
/// service again, even by a new process.
pub struct SqliteResponseCache {
    db: Mutex<Connection>,
}

/// Outcome of a write-once store attempt.
#[derive(Debug, PartialEq, Eq)]
enum Stored {
    /// The row was created or its empty response filled in.
    Written,
    /// The row already held a response; here it is.
    Existing(String),
}

impl SqliteResponseCache {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::Lock)
    }

    #[instrument(skip(self), fields(message_id = %message_id))]
    fn fetch(&self, message_id: &MessageId) -> Result<Option<Option<String>>> {
        let db = self.conn()?;
        match db.query_row(
            "SELECT response FROM assistant_responses WHERE message_id = ?1",
            rusqlite::params![message_id.as_str()],
            |row| row.get::<_, Option<String>>(0),
        ) {
            Ok(response) => Ok(Some(response)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[instrument(skip(self, text), fields(message_id = %message_id, len = text.len()))]
    fn store(&self, message_id: &MessageId, text: &str) -> Result<Stored> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.conn()?;
        let rows_changed = db.execute(
            "INSERT INTO assistant_responses (message_id, response, processed_at, answered_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(message_id) DO UPDATE
                SET response = excluded.response,
                    answered_at = excluded.answered_at
                WHERE assistant_responses.response IS NULL",
            rusqlite::params![message_id.as_str(), text, now],
        )?;
        if rows_changed > 0 {
            debug!("assistant answer stored");
            return Ok(Stored::Written);
        }

        let existing: String = db.query_row(
            "SELECT response FROM assistant_responses WHERE message_id = ?1",
            rusqlite::params![message_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(Stored::Existing(existing))
    }

    fn mark(&self, message_id: &MessageId) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.conn()?;
        db.execute(
            "INSERT OR IGNORE INTO assistant_responses (message_id, response, processed_at)
             VALUES (?1, NULL, ?2)",
            rusqlite::params![message_id.as_str(), now],
        )?;
        Ok(())
    }
}

impl ResponseCache for SqliteResponseCache {
    fn get(&self, message_id: &MessageId) -> std::result::Result<Option<String>, CacheError> {
        Ok(self.fetch(message_id)?.flatten())
    }

    fn put(&self, message_id: &MessageId, text: &str) -> std::result::Result<(), CacheError> {
        match self.store(message_id, text)? {
            Stored::Written => Ok(()),
            Stored::Existing(existing) if existing == text => Ok(()),
            Stored::Existing(_) => Err(CacheError::AlreadyAnswered {
                message_id: message_id.to_string(),
            }),
        }
    }

    fn is_processed(&self, message_id: &MessageId) -> std::result::Result<bool, CacheError> {
        Ok(self.fetch(message_id)?.is_some())
    }

    fn mark_processed(&self, message_id: &MessageId) -> std::result::Result<(), CacheError> {
        Ok(self.mark(message_id)?)
    }
}

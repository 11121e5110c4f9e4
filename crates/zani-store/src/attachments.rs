use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, instrument};
use zani_render::{AttachmentRecord, AttachmentStore, LookupError};

use crate::error::{Result, StoreError};

/// Attachment store backed by the `attachments` table.
pub struct SqliteAttachmentStore {
    db: Mutex<Connection>,
}

impl SqliteAttachmentStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::Lock)
    }

    /// Record an uploaded file. Returns the new row id.
    #[instrument(skip(self, record), fields(name = %record.name))]
    pub fn record(&self, record: &AttachmentRecord) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO attachments (name, url, size_bytes, uploaded_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.name,
                record.url,
                record.size_bytes.map(|s| s as i64),
                now
            ],
        )?;
        let id = db.last_insert_rowid();
        debug!(id, "attachment recorded");
        Ok(id)
    }

    /// Earliest upload with exactly this name.
    pub fn find(&self, name: &str) -> Result<Option<AttachmentRecord>> {
        let db = self.conn()?;
        match db.query_row(
            "SELECT name, url, size_bytes FROM attachments
             WHERE name = ?1
             ORDER BY id
             LIMIT 1",
            rusqlite::params![name],
            |row| {
                Ok(AttachmentRecord {
                    name: row.get(0)?,
                    url: row.get(1)?,
                    size_bytes: row.get::<_, Option<i64>>(2)?.map(|s| s.max(0) as u64),
                })
            },
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }
}

impl AttachmentStore for SqliteAttachmentStore {
    fn lookup_by_name(&self, name: &str) -> std::result::Result<Option<AttachmentRecord>, LookupError> {
        Ok(self.find(name)?)
    }
}

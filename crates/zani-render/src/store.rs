use std::sync::RwLock;

use crate::error::LookupError;
use crate::types::AttachmentRecord;

/// Lookup of previously uploaded files by name.
///
/// Implementations must be `Send + Sync` so one store can back every
/// renderer in the process.
pub trait AttachmentStore: Send + Sync {
    /// Return the first record whose name equals `name` exactly.
    fn lookup_by_name(&self, name: &str) -> Result<Option<AttachmentRecord>, LookupError>;
}

/// Process-local store, in upload order.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    records: RwLock<Vec<AttachmentRecord>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = AttachmentRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    /// Append a record. Earlier records with the same name keep precedence.
    pub fn insert(&self, record: AttachmentRecord) -> Result<(), LookupError> {
        self.records
            .write()
            .map_err(|_| LookupError::Unavailable("attachment registry poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

impl AttachmentStore for MemoryAttachmentStore {
    fn lookup_by_name(&self, name: &str) -> Result<Option<AttachmentRecord>, LookupError> {
        let records = self
            .records
            .read()
            .map_err(|_| LookupError::Unavailable("attachment registry poisoned".to_string()))?;
        Ok(records.iter().find(|r| r.name == name).cloned())
    }
}

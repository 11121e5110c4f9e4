use std::collections::HashMap;
use std::sync::Mutex;

use zani_core::types::MessageId;

use crate::error::CacheError;

/// Durable mapping from message id to the assistant's final answer.
///
/// Entries are write-once: `put` with the text already stored is a no-op,
/// `put` with different text fails with [`CacheError::AlreadyAnswered`].
/// "Processed" is tracked separately so a dispatched-but-unresolved query is
/// visible before any text exists.
pub trait ResponseCache: Send + Sync {
    fn get(&self, message_id: &MessageId) -> Result<Option<String>, CacheError>;

    /// Store the final answer. Implies processed.
    fn put(&self, message_id: &MessageId, text: &str) -> Result<(), CacheError>;

    /// True once a query was dispatched for the message, answered or not.
    fn is_processed(&self, message_id: &MessageId) -> Result<bool, CacheError>;

    /// Record that a query for the message has been dispatched.
    fn mark_processed(&self, message_id: &MessageId) -> Result<(), CacheError>;
}

/// In-process cache, lost on restart. Used by tests and embedders without
/// a database.
#[derive(Default)]
pub struct MemoryResponseCache {
    /// `None` = processed, not yet answered.
    entries: Mutex<HashMap<MessageId, Option<String>>>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<MessageId, Option<String>>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Storage("response cache poisoned".to_string()))
    }
}

impl ResponseCache for MemoryResponseCache {
    fn get(&self, message_id: &MessageId) -> Result<Option<String>, CacheError> {
        Ok(self.lock()?.get(message_id).cloned().flatten())
    }

    fn put(&self, message_id: &MessageId, text: &str) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        let slot = entries.entry(message_id.clone()).or_insert(None);
        if let Some(existing) = slot.as_deref() {
            return if existing == text {
                Ok(())
            } else {
                Err(CacheError::AlreadyAnswered {
                    message_id: message_id.to_string(),
                })
            };
        }
        *slot = Some(text.to_string());
        Ok(())
    }

    fn is_processed(&self, message_id: &MessageId) -> Result<bool, CacheError> {
        Ok(self.lock()?.contains_key(message_id))
    }

    fn mark_processed(&self, message_id: &MessageId) -> Result<(), CacheError> {
        self.lock()?.entry(message_id.clone()).or_insert(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_without_answer() {
        let cache = MemoryResponseCache::new();
        let id = MessageId::from("m1");
        assert!(!cache.is_processed(&id).unwrap());
        cache.mark_processed(&id).unwrap();
        assert!(cache.is_processed(&id).unwrap());
        assert_eq!(cache.get(&id).unwrap(), None);
    }

    #[test]
    fn put_is_write_once() {
        let cache = MemoryResponseCache::new();
        let id = MessageId::from("m1");
        cache.put(&id, "first").unwrap();
        cache.put(&id, "first").unwrap();
        assert!(matches!(
            cache.put(&id, "second"),
            Err(CacheError::AlreadyAnswered { .. })
        ));
        assert_eq!(cache.get(&id).unwrap().as_deref(), Some("first"));
        assert!(cache.is_processed(&id).unwrap());
    }

    #[test]
    fn mark_processed_keeps_existing_answer() {
        let cache = MemoryResponseCache::new();
        let id = MessageId::from("m1");
        cache.put(&id, "done").unwrap();
        cache.mark_processed(&id).unwrap();
        assert_eq!(cache.get(&id).unwrap().as_deref(), Some("done"));
    }
}

use thiserror::Error;
use zani_assistant::CacheError;
use zani_render::LookupError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("database connection lock poisoned")]
    Lock,
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for CacheError {
    fn from(e: StoreError) -> Self {
        CacheError::Storage(e.to_string())
    }
}

impl From<StoreError> for LookupError {
    fn from(e: StoreError) -> Self {
        LookupError::Unavailable(e.to_string())
    }
}

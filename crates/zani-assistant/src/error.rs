use thiserror::Error;

/// Errors from a response cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store failed or is unreachable.
    #[error("response cache storage error: {0}")]
    Storage(String),

    /// A different answer is already cached; entries are write-once.
    #[error("message {message_id} already has a different cached answer")]
    AlreadyAnswered { message_id: String },
}

/// Errors from the external query service.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("query service returned an empty answer")]
    EmptyAnswer,

    #[error("query service unavailable: {0}")]
    Unavailable(String),
}

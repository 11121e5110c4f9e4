//! The embedded assistant: detects messages addressed to it, asks the query
//! service once per message, and caches the answer for every later render.

pub mod cache;
pub mod dispatch;
pub mod error;
pub mod mention;
pub mod openai;
pub mod service;

pub use cache::{MemoryResponseCache, ResponseCache};
pub use dispatch::{AnswerState, QueryDispatcher, FAILURE_SENTINEL};
pub use error::{CacheError, QueryError};
pub use mention::MentionDetector;
pub use openai::OpenAiQueryService;
pub use service::{QueryRequest, QueryService};

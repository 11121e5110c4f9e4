use async_trait::async_trait;
use zani_core::types::{ChannelId, Message, MessageId};

use crate::error::QueryError;

/// Everything the query service gets for one assistant mention.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Text after the mention token.
    pub query: String,
    /// Earlier messages from the same channel, oldest first.
    pub history: Vec<Message>,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    /// The mentioning message, unmodified.
    pub raw_content: String,
}

/// External service that answers assistant queries (an LLM endpoint, usually).
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    async fn answer(&self, request: &QueryRequest) -> Result<String, QueryError>;
}

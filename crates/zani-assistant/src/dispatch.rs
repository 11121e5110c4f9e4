use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use zani_core::config::{AssistantConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_TIMEOUT_SECS};
use zani_core::types::{Message, MessageId};

use crate::cache::ResponseCache;
use crate::error::CacheError;
use crate::mention::MentionDetector;
use crate::service::{QueryRequest, QueryService};

/// Cached in place of an answer when the query service fails or times out.
/// Permanent: the message is never dispatched again.
pub const FAILURE_SENTINEL: &str = "Sorry, I couldn't answer that right now.";

/// A message's assistant answer as the view layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "text")]
pub enum AnswerState {
    /// The message does not address the assistant (or asks nothing).
    NoMention,
    /// Addressed, never dispatched.
    Unanswered,
    /// Dispatched, no answer yet.
    Pending,
    Answered(String),
}

/// What the response cache says about a message.
enum Lookup {
    Answered(String),
    Processed,
    Free,
}

/// Asks the query service at most once per message and caches the outcome.
///
/// Per message: no mention → nothing; cached → the cached text; processed or
/// in flight → nothing; otherwise claim the dispatch token, ask, cache the
/// answer (or [`FAILURE_SENTINEL`]), release the token.
///
/// The dispatch token is a `DashMap` entry inserted only if absent, so two
/// racing callers can never both dispatch, whether they interleave on one
/// task or run on different threads.
pub struct QueryDispatcher {
    detector: MentionDetector,
    cache: Arc<dyn ResponseCache>,
    service: Arc<dyn QueryService>,
    in_flight: DashMap<MessageId, Uuid>,
    timeout: Duration,
    history_limit: usize,
}

impl QueryDispatcher {
    pub fn new(
        detector: MentionDetector,
        cache: Arc<dyn ResponseCache>,
        service: Arc<dyn QueryService>,
    ) -> Self {
        Self {
            detector,
            cache,
            service,
            in_flight: DashMap::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn from_config(
        config: &AssistantConfig,
        cache: Arc<dyn ResponseCache>,
        service: Arc<dyn QueryService>,
    ) -> Self {
        Self::new(MentionDetector::new(config.name.clone()), cache, service)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_history_limit(config.history_limit)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Make sure `message` has an answer if it addresses the assistant.
    ///
    /// Returns the cached or freshly produced text, or `None` when there is
    /// nothing to show yet (no mention, or another call owns the dispatch).
    /// `history` may hold any messages; only earlier ones from the message's
    /// own channel reach the query service.
    #[instrument(skip_all, fields(message_id = %message.id, channel_id = %message.channel_id))]
    pub async fn ensure_answered(&self, message: &Message, history: &[Message]) -> Option<String> {
        let query = self.detector.detect(&message.content)?;

        match self.lookup(&message.id) {
            Ok(Lookup::Answered(text)) => {
                debug!("answer cache hit");
                return Some(text);
            }
            Ok(Lookup::Processed) => {
                debug!("query already dispatched, waiting for its answer");
                return None;
            }
            Ok(Lookup::Free) => {}
            Err(e) => {
                warn!(error = %e, "response cache unavailable, not dispatching");
                return None;
            }
        }

        let Some(guard) = self.claim(&message.id) else {
            debug!("query already in flight");
            return None;
        };

        // Another caller may have finished between the lookup and the claim.
        match self.lookup(&message.id) {
            Ok(Lookup::Answered(text)) => return Some(text),
            Ok(Lookup::Processed) => return None,
            Ok(Lookup::Free) => {}
            Err(e) => {
                warn!(error = %e, "response cache unavailable, not dispatching");
                return None;
            }
        }
        if let Err(e) = self.cache.mark_processed(&message.id) {
            warn!(error = %e, "could not mark message processed, not dispatching");
            return None;
        }

        let request = QueryRequest {
            query,
            history: scoped_history(message, history, self.history_limit),
            channel_id: message.channel_id.clone(),
            message_id: message.id.clone(),
            raw_content: message.content.clone(),
        };
        info!(
            token = %guard.token,
            service = self.service.name(),
            history = request.history.len(),
            "dispatching assistant query"
        );

        let text = match tokio::time::timeout(self.timeout, self.service.answer(&request)).await {
            Ok(Ok(answer)) if !answer.trim().is_empty() => {
                info!(len = answer.len(), "assistant query answered");
                answer
            }
            Ok(Ok(_)) => {
                warn!("assistant query returned an empty answer, caching failure");
                FAILURE_SENTINEL.to_string()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "assistant query failed, caching failure");
                FAILURE_SENTINEL.to_string()
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "assistant query timed out, caching failure");
                FAILURE_SENTINEL.to_string()
            }
        };

        if let Err(e) = self.cache.put(&message.id, &text) {
            error!(error = %e, "failed to cache assistant answer");
        }
        drop(guard);

        Some(text)
    }

    /// Current answer state, without dispatching anything.
    pub fn state(&self, message: &Message) -> AnswerState {
        if self.detector.detect(&message.content).is_none() {
            return AnswerState::NoMention;
        }
        if self.in_flight.contains_key(&message.id) {
            return AnswerState::Pending;
        }
        match self.lookup(&message.id) {
            Ok(Lookup::Answered(text)) => AnswerState::Answered(text),
            Ok(Lookup::Processed) => AnswerState::Pending,
            Ok(Lookup::Free) => AnswerState::Unanswered,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "response cache unavailable");
                AnswerState::Unanswered
            }
        }
    }

    fn lookup(&self, message_id: &MessageId) -> Result<Lookup, CacheError> {
        if let Some(text) = self.cache.get(message_id)? {
            return Ok(Lookup::Answered(text));
        }
        if self.cache.is_processed(message_id)? {
            return Ok(Lookup::Processed);
        }
        Ok(Lookup::Free)
    }

    /// Atomically take the dispatch token for `message_id`.
    fn claim(&self, message_id: &MessageId) -> Option<DispatchGuard<'_>> {
        match self.in_flight.entry(message_id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = Uuid::now_v7();
                slot.insert(token);
                Some(DispatchGuard {
                    in_flight: &self.in_flight,
                    message_id: message_id.clone(),
                    token,
                })
            }
        }
    }
}

/// Releases the dispatch token on every exit path, including the dispatching
/// future being dropped mid-await.
struct DispatchGuard<'a> {
    in_flight: &'a DashMap<MessageId, Uuid>,
    message_id: MessageId,
    token: Uuid,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .remove_if(&self.message_id, |_, token| *token == self.token);
    }
}

/// Earlier messages from `message`'s channel, oldest first, newest `limit` kept.
fn scoped_history(message: &Message, history: &[Message], limit: usize) -> Vec<Message> {
    let mut scoped: Vec<Message> = history
        .iter()
        .filter(|m| {
            m.channel_id == message.channel_id
                && m.id != message.id
                && m.timestamp <= message.timestamp
        })
        .cloned()
        .collect();
    scoped.sort_by_key(|m| m.timestamp);
    let excess = scoped.len().saturating_sub(limit);
    scoped.split_off(excess)
}

// At-most-once dispatch and answer caching, driven through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use tokio::sync::Notify;
use zani_assistant::{
    AnswerState, MemoryResponseCache, MentionDetector, QueryDispatcher, QueryError, QueryRequest,
    QueryService, ResponseCache, FAILURE_SENTINEL,
};
use zani_core::types::{Message, MessageId};

/// Answers "re: {query}" after an optional delay and counts calls.
#[derive(Default)]
struct CountingService {
    calls: AtomicUsize,
    delay: Duration,
    last: Mutex<Option<QueryRequest>>,
}

impl CountingService {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryService for CountingService {
    fn name(&self) -> &str {
        "counting"
    }

    async fn answer(&self, request: &QueryRequest) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("re: {}", request.query))
    }
}

#[derive(Default)]
struct FailingService {
    calls: AtomicUsize,
}

#[async_trait]
impl QueryService for FailingService {
    fn name(&self) -> &str {
        "failing"
    }

    async fn answer(&self, _request: &QueryRequest) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(QueryError::Api {
            status: 500,
            message: "boom".to_string(),
        })
    }
}

/// Blocks until released, so a test can observe the in-flight state.
#[derive(Default)]
struct GatedService {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl QueryService for GatedService {
    fn name(&self) -> &str {
        "gated"
    }

    async fn answer(&self, request: &QueryRequest) -> Result<String, QueryError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(format!("re: {}", request.query))
    }
}

fn dispatcher(service: Arc<dyn QueryService>) -> (QueryDispatcher, Arc<MemoryResponseCache>) {
    let cache = Arc::new(MemoryResponseCache::new());
    let dispatcher = QueryDispatcher::new(MentionDetector::new("zani"), cache.clone(), service)
        .with_timeout(Duration::from_secs(5));
    (dispatcher, cache)
}

fn msg(id: &str, channel: &str, content: &str, secs: i64) -> Message {
    Message::new(id, channel, "alice", content)
        .with_timestamp(DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap())
}

#[tokio::test]
async fn message_without_mention_is_ignored() {
    let service = Arc::new(CountingService::default());
    let (dispatcher, cache) = dispatcher(service.clone());
    let m = msg("m1", "general", "hello @alice", 0);

    assert_eq!(dispatcher.ensure_answered(&m, &[]).await, None);
    assert_eq!(dispatcher.state(&m), AnswerState::NoMention);
    assert_eq!(service.calls(), 0);
    assert!(!cache.is_processed(&m.id).unwrap());
}

#[tokio::test]
async fn bare_or_prefixed_mentions_do_not_dispatch() {
    let service = Arc::new(CountingService::default());
    let (dispatcher, _cache) = dispatcher(service.clone());

    for content in [
        "thanks @zani",
        "@zani-bot what time is it",
        "@zanix hi",
        "ops@zani hi",
        "write to ops@zani about the outage",
    ] {
        let m = msg("m1", "general", content, 0);
        assert_eq!(dispatcher.ensure_answered(&m, &[]).await, None, "{content}");
    }
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn answer_is_fetched_once_and_reused() {
    let service = Arc::new(CountingService::default());
    let (dispatcher, cache) = dispatcher(service.clone());
    let m = msg("m1", "general", "@zani status?", 0);

    let first = dispatcher.ensure_answered(&m, &[]).await;
    let second = dispatcher.ensure_answered(&m, &[]).await;

    assert_eq!(first.as_deref(), Some("re: status?"));
    assert_eq!(first, second);
    assert_eq!(service.calls(), 1);
    assert_eq!(cache.get(&m.id).unwrap().as_deref(), Some("re: status?"));
}

#[tokio::test]
async fn interleaved_calls_dispatch_once() {
    let service = Arc::new(CountingService::with_delay(Duration::from_millis(50)));
    let (dispatcher, _cache) = dispatcher(service.clone());
    let m = msg("m1", "general", "@zani summarize", 0);

    let results =
        futures_util::future::join_all((0..8).map(|_| dispatcher.ensure_answered(&m, &[]))).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(
        dispatcher.ensure_answered(&m, &[]).await.as_deref(),
        Some("re: summarize")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_tasks_dispatch_once() {
    let service = Arc::new(CountingService::with_delay(Duration::from_millis(50)));
    let (dispatcher, _cache) = dispatcher(service.clone());
    let dispatcher = Arc::new(dispatcher);
    let m = msg("m1", "general", "@zani summarize", 0);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let m = m.clone();
            tokio::spawn(async move { dispatcher.ensure_answered(&m, &[]).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn failure_is_cached_and_never_retried() {
    let service = Arc::new(FailingService::default());
    let (dispatcher, _cache) = dispatcher(service.clone());
    let m = msg("m1", "general", "@zani why?", 0);

    assert_eq!(
        dispatcher.ensure_answered(&m, &[]).await.as_deref(),
        Some(FAILURE_SENTINEL)
    );
    assert_eq!(
        dispatcher.ensure_answered(&m, &[]).await.as_deref(),
        Some(FAILURE_SENTINEL)
    );
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        dispatcher.state(&m),
        AnswerState::Answered(FAILURE_SENTINEL.to_string())
    );
}

#[tokio::test]
async fn timeout_is_cached_as_failure() {
    let service = Arc::new(CountingService::with_delay(Duration::from_secs(10)));
    let cache = Arc::new(MemoryResponseCache::new());
    let dispatcher =
        QueryDispatcher::new(MentionDetector::new("zani"), cache.clone(), service.clone())
            .with_timeout(Duration::from_millis(20));
    let m = msg("m1", "general", "@zani slow one", 0);

    assert_eq!(
        dispatcher.ensure_answered(&m, &[]).await.as_deref(),
        Some(FAILURE_SENTINEL)
    );
    assert_eq!(cache.get(&m.id).unwrap().as_deref(), Some(FAILURE_SENTINEL));
    assert_eq!(dispatcher.ensure_answered(&m, &[]).await.as_deref(), Some(FAILURE_SENTINEL));
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn history_only_contains_same_channel_messages() {
    let service = Arc::new(CountingService::default());
    let cache = Arc::new(MemoryResponseCache::new());
    let dispatcher =
        QueryDispatcher::new(MentionDetector::new("zani"), cache, service.clone())
            .with_history_limit(2);

    let target = msg("m4", "general", "@zani recap", 40);
    let history = vec![
        msg("m1", "general", "oldest", 10),
        msg("x1", "random", "elsewhere", 15),
        msg("m2", "general", "middle", 20),
        msg("m3", "general", "newest", 30),
        target.clone(),
    ];
    dispatcher.ensure_answered(&target, &history).await;

    let request = service.last.lock().unwrap().clone().unwrap();
    let contents: Vec<_> = request.history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["middle", "newest"]);
    assert_eq!(request.query, "recap");
    assert_eq!(request.raw_content, "@zani recap");
    assert_eq!(request.channel_id.as_str(), "general");
}

#[tokio::test]
async fn existing_cache_entry_is_served_without_dispatch() {
    let service = Arc::new(CountingService::default());
    let (dispatcher, cache) = dispatcher(service.clone());
    let m = msg("m1", "general", "@zani hi", 0);
    cache.put(&m.id, "cached earlier").unwrap();

    assert_eq!(
        dispatcher.ensure_answered(&m, &[]).await.as_deref(),
        Some("cached earlier")
    );
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn processed_message_without_answer_is_not_redispatched() {
    let service = Arc::new(CountingService::default());
    let (dispatcher, cache) = dispatcher(service.clone());
    let m = msg("m1", "general", "@zani hi", 0);
    cache.mark_processed(&MessageId::from("m1")).unwrap();

    assert_eq!(dispatcher.ensure_answered(&m, &[]).await, None);
    assert_eq!(dispatcher.state(&m), AnswerState::Pending);
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn state_moves_from_unanswered_to_answered() {
    let service = Arc::new(GatedService::default());
    let (dispatcher, _cache) = dispatcher(service.clone());
    let dispatcher = Arc::new(dispatcher);
    let m = msg("m1", "general", "@zani ping", 0);

    assert_eq!(dispatcher.state(&m), AnswerState::Unanswered);

    let task = {
        let dispatcher = dispatcher.clone();
        let m = m.clone();
        tokio::spawn(async move { dispatcher.ensure_answered(&m, &[]).await })
    };
    service.started.notified().await;
    assert_eq!(dispatcher.state(&m), AnswerState::Pending);
    assert_eq!(dispatcher.ensure_answered(&m, &[]).await, None);

    service.release.notify_one();
    assert_eq!(task.await.unwrap().as_deref(), Some("re: ping"));
    assert_eq!(dispatcher.state(&m), AnswerState::Answered("re: ping".to_string()));
}

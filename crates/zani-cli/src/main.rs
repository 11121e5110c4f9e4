use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use zani_assistant::{
    AnswerState, OpenAiQueryService, QueryDispatcher, QueryError, QueryRequest, QueryService,
    ResponseCache,
};
use zani_core::config::ZaniConfig;
use zani_core::types::{Message, MessageId};
use zani_render::{Attachment, AttachmentRecord, ContentTransformer};
use zani_store::{SqliteAttachmentStore, SqliteResponseCache};

#[derive(Parser)]
#[command(name = "zani", version, about = "Render chat messages and answer assistant mentions")]
struct Cli {
    /// Config file (default: $ZANI_CONFIG, then ~/.zani/zani.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a JSON array of messages, one JSON line per message.
    Render {
        file: PathBuf,
        /// Report cached answer state only, never ask the assistant.
        #[arg(long)]
        no_answers: bool,
    },
    /// Record an uploaded file so attachment lines resolve to it.
    Upload {
        name: String,
        url: String,
        #[arg(long)]
        size: Option<u64>,
    },
    /// Show the cached assistant answer for a message.
    Answer { message_id: String },
}

#[derive(Serialize)]
struct RenderedMessage<'a> {
    id: &'a MessageId,
    channel_id: &'a str,
    markup: String,
    attachments: Vec<Attachment>,
    answer: AnswerState,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zani=info,zani_assistant=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // explicit --config > ZANI_CONFIG env > ~/.zani/zani.toml
    let config_path = cli.config.or_else(|| std::env::var("ZANI_CONFIG").ok());
    let config = ZaniConfig::load(config_path.as_deref()).context("loading config")?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    zani_store::db::init_db(&db)?;

    let open = || rusqlite::Connection::open(db_path);

    match cli.command {
        Command::Render { file, no_answers } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let messages: Vec<Message> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing messages in {}", file.display()))?;

            let attachments = Arc::new(SqliteAttachmentStore::new(open()?));
            let transformer = ContentTransformer::from_config(&config, attachments)?;

            let service = build_service(&config);
            let ask = !no_answers && service.is_some();
            let service: Arc<dyn QueryService> = match service {
                Some(s) => s,
                None => {
                    if !no_answers {
                        warn!("no assistant.api_key configured, reporting cached answers only");
                    }
                    Arc::new(NullService)
                }
            };
            let cache = Arc::new(SqliteResponseCache::new(open()?));
            let dispatcher = QueryDispatcher::from_config(&config.assistant, cache, service);

            for message in &messages {
                let content = transformer.transform(&message.content);
                if ask {
                    dispatcher.ensure_answered(message, &messages).await;
                }
                let line = RenderedMessage {
                    id: &message.id,
                    channel_id: message.channel_id.as_str(),
                    markup: content.markup,
                    attachments: content.attachments,
                    answer: dispatcher.state(message),
                };
                println!("{}", serde_json::to_string(&line)?);
            }
        }
        Command::Upload { name, url, size } => {
            let store = SqliteAttachmentStore::new(open()?);
            let id = store.record(&AttachmentRecord {
                name: name.clone(),
                url,
                size_bytes: size,
            })?;
            info!(id, name = %name, "attachment recorded");
        }
        Command::Answer { message_id } => {
            let cache = SqliteResponseCache::new(open()?);
            let id = MessageId::from(message_id);
            let answer = cache.get(&id)?;
            let processed = cache.is_processed(&id)?;
            println!(
                "{}",
                serde_json::json!({ "id": id, "processed": processed, "answer": answer })
            );
        }
    }

    Ok(())
}

fn build_service(config: &ZaniConfig) -> Option<Arc<dyn QueryService>> {
    let service = OpenAiQueryService::from_config(&config.assistant)?;
    info!(model = %config.assistant.model, base_url = %config.assistant.base_url, "assistant query service: OpenAI");
    Some(Arc::new(service))
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Stands in for the query service when no API key is configured. Never
/// dispatched to: `render` only reads state in that case.
struct NullService;

#[async_trait::async_trait]
impl QueryService for NullService {
    fn name(&self) -> &str {
        "null"
    }

    async fn answer(&self, _request: &QueryRequest) -> Result<String, QueryError> {
        Err(QueryError::Unavailable(
            "no query service configured, set assistant.api_key in zani.toml".into(),
        ))
    }
}

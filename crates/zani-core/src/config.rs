use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::tokens::{DEFAULT_ASSISTANT_NAME, DEFAULT_ATTACHMENT_MARKER};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Top-level config (zani.toml + ZANI_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaniConfig {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// The embedded assistant and the chat-completions endpoint answering for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Mention name without the leading `@`.
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Answers are disabled when no key is configured.
    pub api_key: Option<String>,
    /// Upper bound for a single query; expiry is cached as a failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Newest same-channel messages sent along with a query.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_attachment_marker")]
    pub attachment_marker: String,
    /// Shown for image attachments the store has no record of.
    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            attachment_marker: default_attachment_marker(),
            placeholder_image_url: default_placeholder_image_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_assistant_name() -> String {
    DEFAULT_ASSISTANT_NAME.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_system_prompt() -> String {
    "You are Zani, an assistant embedded in a team chat. \
     Answer the question you were mentioned with, using the recent channel \
     messages as context. Be concise."
        .to_string()
}
fn default_attachment_marker() -> String {
    DEFAULT_ATTACHMENT_MARKER.to_string()
}
fn default_placeholder_image_url() -> String {
    "/assets/attachment-placeholder.svg".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.zani/zani.db", home)
}

impl ZaniConfig {
    /// Load config from a TOML file with ZANI_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.zani/zani.toml
    ///
    /// A missing file is not an error; every section has defaults.
    /// Nested env keys use a double underscore: `ZANI_ASSISTANT__API_KEY`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        Self::from_figment(
            Figment::from(Serialized::defaults(ZaniConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed("ZANI_").split("__")),
        )
    }

    /// Extract a config from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: ZaniConfig = figment
            .extract()
            .map_err(|e| crate::error::ZaniError::Config(e.to_string()))?;

        // The name has to be matchable by the mention pattern.
        let name = &config.assistant.name;
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(crate::error::ZaniError::Config(format!(
                "assistant.name must be a non-empty mention name, got {name:?}"
            )));
        }
        if config.assistant.timeout_secs == 0 {
            return Err(crate::error::ZaniError::Config(
                "assistant.timeout_secs must be at least 1".to_string(),
            ));
        }
        if config.render.attachment_marker.trim().is_empty() {
            return Err(crate::error::ZaniError::Config(
                "render.attachment_marker must not be blank".to_string(),
            ));
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.zani/zani.toml", home)
}

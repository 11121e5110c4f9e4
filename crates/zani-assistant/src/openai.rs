use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use zani_core::config::AssistantConfig;

use crate::error::QueryError;
use crate::service::{QueryRequest, QueryService};

/// Answers assistant queries through an OpenAI-compatible chat-completions API.
pub struct OpenAiQueryService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl OpenAiQueryService {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        max_tokens: u32,
        system_prompt: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            model,
            max_tokens,
            system_prompt,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &AssistantConfig) -> Option<Self> {
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(
            api_key,
            Some(config.base_url.trim_end_matches('/').to_string()),
            config.model.clone(),
            config.max_tokens,
            config.system_prompt.clone(),
        ))
    }

    fn build_request_body(&self, req: &QueryRequest) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": self.system_prompt,
        })];

        // Channel history goes in as plain user turns prefixed with the author.
        for m in &req.history {
            messages.push(serde_json::json!({
                "role": "user",
                "content": format!("{}: {}", m.user_id, m.content),
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": req.query,
        }));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "stream": false,
        })
    }
}

#[async_trait]
impl QueryService for OpenAiQueryService {
    fn name(&self) -> &str {
        "openai"
    }

    async fn answer(&self, req: &QueryRequest) -> Result<String, QueryError> {
        let body = self.build_request_body(req);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %self.model, message_id = %req.message_id, "sending query to OpenAI");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000) // convert seconds to ms
                .unwrap_or(5000);
            return Err(QueryError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI API error");
            return Err(QueryError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| QueryError::Parse(e.to_string()))?;

        parse_response(api_resp)
    }
}

fn parse_response(resp: ApiResponse) -> Result<String, QueryError> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(QueryError::EmptyAnswer);
    }
    Ok(content)
}

// deserialization only

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

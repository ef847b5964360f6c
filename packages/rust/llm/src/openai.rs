//! OpenAI-compatible Chat Completions backend.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use codeless_shared::{AppConfig, CodelessError, Result};

use crate::LanguageModel;
use crate::types::{Message, MessageRole};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("codeless/", env!("CARGO_PKG_VERSION"));

/// How much of an error body to keep in the error message.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection settings for [`OpenAiLanguageModel`].
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model_name: String,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl OpenAiSettings {
    /// Settings from the `[openai]` config section plus a resolved key.
    pub fn from_config(config: &AppConfig, api_key: String) -> Self {
        Self {
            api_key,
            model_name: config.openai.model_name.clone(),
            base_url: config.openai.base_url.clone(),
            timeout_secs: config.openai.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

/// Reply message as sent by the API; `content` may be null.
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    role: MessageRole,
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat Completions client.
#[derive(Debug, Clone)]
pub struct OpenAiLanguageModel {
    client: Client,
    endpoint: Url,
    api_key: String,
    model_name: String,
}

impl OpenAiLanguageModel {
    /// Build a client for the given settings.
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        let endpoint = completions_url(&settings.base_url)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CodelessError::backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key,
            model_name: settings.model_name,
        })
    }

    /// Model identifier sent with every request.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl LanguageModel for OpenAiLanguageModel {
    #[instrument(skip_all, fields(model = %self.model_name, messages = messages.len()))]
    async fn prompt(&self, messages: &[Message]) -> Result<Message> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model_name,
            messages,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CodelessError::backend(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CodelessError::backend(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(CodelessError::backend(format!(
                "HTTP {status}: {}",
                preview(&body)
            )));
        }

        let reply = decode_reply(&body)?;

        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            reply_len = reply.content.len(),
            "completion received"
        );

        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn completions_url(base_url: &str) -> Result<Url> {
    let raw = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| CodelessError::config(format!("invalid base_url '{base_url}': {e}")))
}

/// Take the first choice of a Chat Completions response body.
fn decode_reply(body: &str) -> Result<Message> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        CodelessError::backend(format!("invalid completion response: {e} (got: {})", preview(body)))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CodelessError::backend("completion response has no choices"))?;

    let content = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| CodelessError::backend("completion reply is empty"))?;

    debug!(role = %choice.message.role, "decoded completion reply");

    Ok(Message {
        role: choice.message.role,
        content,
    })
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Claude over the Messages API (`POST {base}/v1/messages`).
//!
//! System text travels in a top-level `system` field rather than as a
//! message, and replies arrive as typed content blocks; only `text` blocks
//! contribute to the completion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AiProvider, ProviderError, map_reqwest_error, map_status_error};
use crate::types::{ChatRequest, ChatResponse, FinishReason, MessageRole, ProviderId, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
/// The Messages API rejects requests without `max_tokens`.
const FALLBACK_MAX_TOKENS: u32 = 4096;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesBody {
    model: String,
    max_tokens: u32,
    messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Turn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    model: String,
    content: Vec<Block>,
    usage: Usage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

fn finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("max_tokens") => FinishReason::Length,
        Some("refusal") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

impl From<MessagesReply> for ChatResponse {
    fn from(reply: MessagesReply) -> Self {
        let content = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();

        Self {
            content,
            model: reply.model,
            finish_reason: finish_reason(reply.stop_reason.as_deref()),
            usage: TokenUsage {
                prompt_tokens: reply.usage.input_tokens,
                completion_tokens: reply.usage.output_tokens,
                total_tokens: reply.usage.input_tokens + reply.usage.output_tokens,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            api_key,
            endpoint: format!("{}/v1/messages", base.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    /// An explicit `system_prompt` replaces any system-role messages; without
    /// one, system messages are joined into the `system` field.
    fn body(&self, request: &ChatRequest) -> MessagesBody {
        let (system_turns, turns): (Vec<_>, Vec<_>) = request
            .messages
            .iter()
            .partition(|m| m.role == MessageRole::System);

        let system = request.system_prompt.clone().or_else(|| {
            (!system_turns.is_empty()).then(|| {
                system_turns
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })
        });

        MessagesBody {
            model: request.model.clone(),
            max_tokens: match request.max_tokens {
                0 => FALLBACK_MAX_TOKENS,
                n => n,
            },
            messages: turns
                .into_iter()
                .map(|m| Turn {
                    role: match m.role {
                        MessageRole::Assistant => "assistant",
                        _ => "user",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            system,
            temperature: request.temperature,
        }
    }

    async fn read_reply(&self, resp: reqwest::Response) -> Result<ChatResponse, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status_error(self.name(), status, &body));
        }

        resp.json::<MessagesReply>()
            .await
            .map(ChatResponse::from)
            .map_err(|e| ProviderError::Other(format!("Malformed Messages API reply: {e}")))
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Claude
    }

    fn name(&self) -> &str {
        "Claude"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::InvalidKey);
        }

        debug!(provider = %ProviderId::Claude, model = %request.model, endpoint = %self.endpoint, "sending messages request");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.body(request))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        self.read_reply(resp).await
    }
}

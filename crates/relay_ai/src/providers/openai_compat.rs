//! OpenAI-compatible provider.
//!
//! One implementation covers every backend speaking the `/chat/completions`
//! dialect: a self-hosted Ollama/vLLM server, OpenAI itself, Gemini's
//! OpenAI-compatible endpoint, xAI Grok, DeepSeek and the OpenRouter gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AiProvider, ProviderError, map_reqwest_error, map_status_error};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, FinishReason, MessageRole, ProviderId, TokenUsage,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const GROK_BASE: &str = "https://api.x.ai/v1";
const DEEPSEEK_BASE: &str = "https://api.deepseek.com/v1";
const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A `/chat/completions` backend with optional bearer authentication.
pub struct OpenAiCompatibleProvider {
    id: ProviderId,
    name: String,
    api_key: Option<String>,
    base_url: String,
    requires_key: bool,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create a provider for an arbitrary OpenAI-compatible endpoint.
    pub fn new(
        id: ProviderId,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        requires_key: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            requires_key,
            client: reqwest::Client::new(),
        }
    }

    /// Self-hosted server (Ollama, vLLM, llama.cpp). No key required.
    pub fn self_hosted(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::new(ProviderId::SelfHosted, "Self-hosted", base_url, api_key, false)
    }

    pub fn openai(api_key: String, base_url: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| OPENAI_BASE.into());
        Self::new(ProviderId::OpenAI, "OpenAI", url, Some(api_key), true)
    }

    pub fn gemini(api_key: String, base_url: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| GEMINI_BASE.into());
        Self::new(ProviderId::Gemini, "Google Gemini", url, Some(api_key), true)
    }

    pub fn grok(api_key: String, base_url: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| GROK_BASE.into());
        Self::new(ProviderId::Grok, "xAI Grok", url, Some(api_key), true)
    }

    pub fn deepseek(api_key: String, base_url: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| DEEPSEEK_BASE.into());
        Self::new(ProviderId::DeepSeek, "DeepSeek", url, Some(api_key), true)
    }

    /// OpenRouter, used as the aggregation gateway.
    pub fn openrouter(api_key: String, base_url: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| OPENROUTER_BASE.into());
        Self::new(ProviderId::Gateway, "OpenRouter", url, Some(api_key), true)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn convert_messages(messages: &[ChatMessage], system_prompt: Option<&str>) -> Vec<WireMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system_prompt {
            out.push(WireMessage {
                role: "system",
                content: sys.to_string(),
            });
        }

        out.extend(messages.iter().map(|m| WireMessage {
            role: match m.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::System => "system",
            },
            content: m.content.clone(),
        }));

        out
    }

    fn build_body(&self, request: &ChatRequest) -> CompletionRequest {
        CompletionRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages, request.system_prompt.as_deref()),
            stream: false,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn parse_response(data: CompletionResponse, requested_model: &str) -> Result<ChatResponse, ProviderError> {
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No choices in completion response".into()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = data
            .usage
            .map(|u| {
                let p = u.prompt_tokens.unwrap_or(0);
                let c = u.completion_tokens.unwrap_or(0);
                TokenUsage {
                    prompt_tokens: p,
                    completion_tokens: c,
                    total_tokens: u.total_tokens.unwrap_or(p + c),
                }
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: data.model.unwrap_or_else(|| requested_model.to_string()),
            usage,
            finish_reason,
        })
    }

    /// Turn a raw HTTP response into a [`ChatResponse`], mapping error codes.
    async fn handle_response(
        &self,
        resp: reqwest::Response,
        requested_model: &str,
    ) -> Result<ChatResponse, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_status_error(&self.name, status, &text));
        }

        let data: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("JSON parse error: {e}")))?;

        Self::parse_response(data, requested_model)
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatibleProvider {
    fn provider_id(&self) -> ProviderId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.requires_key || self.api_key.is_some()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if self.requires_key && self.api_key.is_none() {
            return Err(ProviderError::InvalidKey);
        }

        let body = self.build_body(request);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.id, model = %request.model, "POST {url}");

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder.send().await.map_err(map_reqwest_error)?;
        self.handle_response(resp, &request.model).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

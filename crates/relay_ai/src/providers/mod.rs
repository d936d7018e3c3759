//! AI provider trait and implementations.
//!
//! Each provider module exposes a struct that implements [`AiProvider`].

pub mod anthropic;
pub mod openai_compat;

use async_trait::async_trait;

use crate::types::{ChatRequest, ChatResponse, ProviderId};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that any provider may return.
///
/// `Unavailable` and `CircuitOpen` are raised before any network traffic;
/// everything else describes a failed live call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited")]
    RateLimit,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("Timeout")]
    Timeout,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Circuit open for {0}")]
    CircuitOpen(ProviderId),

    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// True for errors detected before a request was sent.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::CircuitOpen(_))
    }
}

/// Map an HTTP status code (and response body) to a [`ProviderError`].
pub(crate) fn map_status_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::InvalidKey,
        429 => ProviderError::RateLimit,
        408 | 504 => ProviderError::Timeout,
        404 => ProviderError::ModelUnavailable(truncate_error(body)),
        _ => ProviderError::Other(format!("{provider} API error {status}: {}", truncate_error(body))),
    }
}

/// Map a reqwest transport error to a [`ProviderError`].
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::Network(format!("Connection failed: {e}"))
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Pull a readable message out of a JSON error body, or truncate the raw body.
pub(crate) fn truncate_error(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.pointer("/message"))
            .and_then(|m| m.as_str());
        if let Some(msg) = message {
            return msg.to_string();
        }
    }

    if body.chars().count() > 200 {
        let head: String = body.chars().take(200).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Unified interface for all chat backends (cloud and self-hosted).
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Which backend this is.
    fn provider_id(&self) -> ProviderId;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Whether the provider is configured well enough to accept requests.
    async fn is_available(&self) -> bool;

    /// Non-streaming completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            map_status_error("X", StatusCode::UNAUTHORIZED, ""),
            ProviderError::InvalidKey
        );
        assert_eq!(
            map_status_error("X", StatusCode::FORBIDDEN, ""),
            ProviderError::InvalidKey
        );
        assert_eq!(
            map_status_error("X", StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimit
        );
        assert_eq!(
            map_status_error("X", StatusCode::REQUEST_TIMEOUT, ""),
            ProviderError::Timeout
        );
        assert_eq!(
            map_status_error("X", StatusCode::GATEWAY_TIMEOUT, ""),
            ProviderError::Timeout
        );
        assert!(matches!(
            map_status_error("X", StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ProviderError::Other(msg) if msg.contains("500") && msg.contains("boom")
        ));
    }

    #[test]
    fn truncate_error_prefers_json_message() {
        let body = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        assert_eq!(truncate_error(body), "model not found");
    }

    #[test]
    fn truncate_error_clips_long_bodies() {
        let body = "x".repeat(500);
        let out = truncate_error(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.len(), 203);
    }

    #[test]
    fn unavailable_errors_are_pre_invocation() {
        assert!(ProviderError::Unavailable("disabled".into()).is_unavailable());
        assert!(ProviderError::CircuitOpen(ProviderId::Grok).is_unavailable());
        assert!(!ProviderError::Timeout.is_unavailable());
    }
}

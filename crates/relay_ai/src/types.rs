use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A single chat message exchanged with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChatMessage {
    /// Create a text message stamped with the current time.
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// A request to an AI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> u32 {
    4096
}

/// Token usage statistics returned by providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// Complete response from an AI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Every backend the router can send a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    SelfHosted,
    Gateway,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    Claude,
    Grok,
    #[serde(rename = "deepseek")]
    DeepSeek,
}

impl ProviderId {
    pub const ALL: [ProviderId; 7] = [
        Self::SelfHosted,
        Self::Gateway,
        Self::OpenAI,
        Self::Gemini,
        Self::Claude,
        Self::Grok,
        Self::DeepSeek,
    ];

    /// Vendor APIs reachable directly (everything except self-hosted and gateway).
    pub const DIRECT_API: [ProviderId; 5] = [
        Self::OpenAI,
        Self::Gemini,
        Self::Claude,
        Self::Grok,
        Self::DeepSeek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfHosted => "self-hosted",
            Self::Gateway => "gateway",
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Grok => "grok",
            Self::DeepSeek => "deepseek",
        }
    }

    pub fn is_direct_api(self) -> bool {
        !matches!(self, Self::SelfHosted | Self::Gateway)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Task categories
// ---------------------------------------------------------------------------

/// What kind of request is being made. Drives temperature, provider choice
/// and the scoring heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    StructuredOutput,
    CodeGeneration,
    CreativeWriting,
    ComplexReasoning,
    ToolExecution,
    DataAnalysis,
    MathReasoning,
    Conversational,
    RealtimeInfo,
    Multimodal,
    SafetyCritical,
    CostOptimized,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 12] = [
        Self::StructuredOutput,
        Self::CodeGeneration,
        Self::CreativeWriting,
        Self::ComplexReasoning,
        Self::ToolExecution,
        Self::DataAnalysis,
        Self::MathReasoning,
        Self::Conversational,
        Self::RealtimeInfo,
        Self::Multimodal,
        Self::SafetyCritical,
        Self::CostOptimized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StructuredOutput => "structured-output",
            Self::CodeGeneration => "code-generation",
            Self::CreativeWriting => "creative-writing",
            Self::ComplexReasoning => "complex-reasoning",
            Self::ToolExecution => "tool-execution",
            Self::DataAnalysis => "data-analysis",
            Self::MathReasoning => "math-reasoning",
            Self::Conversational => "conversational",
            Self::RealtimeInfo => "realtime-info",
            Self::Multimodal => "multimodal",
            Self::SafetyCritical => "safety-critical",
            Self::CostOptimized => "cost-optimized",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown task category: {s}"))
    }
}

// ---------------------------------------------------------------------------
// User tiers
// ---------------------------------------------------------------------------

/// The caller's cost/quality policy class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    #[default]
    Standard,
    Premium,
    Enterprise,
}

impl UserTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    /// Premium and enterprise callers get a lenient decision threshold.
    pub fn is_premium(self) -> bool {
        matches!(self, Self::Premium | Self::Enterprise)
    }
}

impl std::fmt::Display for UserTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown user tier: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_labels_round_trip_through_from_str() {
        for p in ProviderId::ALL {
            assert_eq!(p.as_str().parse::<ProviderId>(), Ok(p));
        }
        assert!("mistral".parse::<ProviderId>().is_err());
    }

    #[test]
    fn provider_serde_uses_labels() {
        let json = serde_json::to_string(&ProviderId::SelfHosted).unwrap();
        assert_eq!(json, "\"self-hosted\"");
        let p: ProviderId = serde_json::from_str("\"deepseek\"").unwrap();
        assert_eq!(p, ProviderId::DeepSeek);
        let p: ProviderId = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(p, ProviderId::OpenAI);
    }

    #[test]
    fn direct_api_excludes_self_hosted_and_gateway() {
        assert!(!ProviderId::DIRECT_API.contains(&ProviderId::SelfHosted));
        assert!(!ProviderId::DIRECT_API.contains(&ProviderId::Gateway));
        assert!(ProviderId::DIRECT_API.iter().all(|p| p.is_direct_api()));
    }

    #[test]
    fn task_category_serde_matches_display() {
        for c in TaskCategory::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{c}\""));
        }
        assert_eq!(
            "Math-Reasoning".parse::<TaskCategory>(),
            Ok(TaskCategory::MathReasoning)
        );
    }

    #[test]
    fn tier_defaults_to_standard() {
        assert_eq!(UserTier::default(), UserTier::Standard);
        assert!(UserTier::Enterprise.is_premium());
        assert!(!UserTier::Free.is_premium());
        assert_eq!("PREMIUM".parse::<UserTier>(), Ok(UserTier::Premium));
    }
}

//! Provider Catalog
//!
//! Static table of provider descriptors (capabilities, cost, enablement,
//! specialties), the per-category provider preferences, and the user-tier
//! cost policy used to pick a direct vendor API.

use std::collections::{BTreeMap, HashMap};

use relay_core::RelayConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::providers::ProviderError;
use crate::types::{ProviderId, TaskCategory, UserTier};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A feature a task may require of its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    JsonMode,
    FunctionCalling,
    Vision,
    Streaming,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    pub json_mode: bool,
    pub function_calling: bool,
    pub vision: bool,
    pub streaming: bool,
}

impl CapabilityFlags {
    pub fn has(&self, cap: Capability) -> bool {
        match cap {
            Capability::JsonMode => self.json_mode,
            Capability::FunctionCalling => self.function_calling,
            Capability::Vision => self.vision,
            Capability::Streaming => self.streaming,
        }
    }
}

const ALL_CAPS: CapabilityFlags = CapabilityFlags {
    json_mode: true,
    function_calling: true,
    vision: true,
    streaming: true,
};

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Everything the router knows about one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub name: String,
    pub enabled: bool,
    pub has_credentials: bool,
    pub base_url: String,
    pub default_model: String,
    /// Per-category model overrides; anything missing uses `default_model`.
    pub models: HashMap<TaskCategory, String>,
    pub capabilities: CapabilityFlags,
    pub max_context_tokens: u32,
    /// USD per 1k tokens.
    pub cost_per_1k_tokens: f64,
    pub specialties: Vec<TaskCategory>,
}

impl ProviderDescriptor {
    /// Enabled and credentialed.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.has_credentials
    }

    pub fn model_for(&self, category: TaskCategory) -> &str {
        self.models
            .get(&category)
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }

    pub fn supports_all(&self, caps: &[Capability]) -> bool {
        caps.iter().all(|c| self.capabilities.has(*c))
    }
}

fn models(entries: &[(TaskCategory, &str)]) -> HashMap<TaskCategory, String> {
    entries
        .iter()
        .map(|(c, m)| (*c, (*m).to_string()))
        .collect()
}

fn default_descriptors() -> Vec<ProviderDescriptor> {
    use TaskCategory::*;

    vec![
        ProviderDescriptor {
            id: ProviderId::SelfHosted,
            name: "Self-hosted".into(),
            enabled: true,
            has_credentials: true,
            base_url: "http://localhost:11434/v1".into(),
            default_model: "llama3.1:8b".into(),
            models: HashMap::new(),
            capabilities: CapabilityFlags {
                json_mode: true,
                function_calling: false,
                vision: false,
                streaming: true,
            },
            max_context_tokens: 8_192,
            cost_per_1k_tokens: 0.0,
            specialties: vec![CostOptimized, Conversational],
        },
        ProviderDescriptor {
            id: ProviderId::Gateway,
            name: "OpenRouter".into(),
            enabled: false,
            has_credentials: false,
            base_url: "https://openrouter.ai/api/v1".into(),
            default_model: "openai/gpt-4o-mini".into(),
            models: models(&[
                (StructuredOutput, "openai/gpt-4o"),
                (CodeGeneration, "anthropic/claude-3.5-sonnet"),
                (CreativeWriting, "anthropic/claude-3-opus"),
                (ComplexReasoning, "anthropic/claude-3.5-sonnet"),
                (ToolExecution, "openai/gpt-4o"),
                (DataAnalysis, "google/gemini-pro-1.5"),
                (MathReasoning, "deepseek/deepseek-r1"),
                (RealtimeInfo, "x-ai/grok-2"),
                (Multimodal, "google/gemini-pro-1.5"),
                (SafetyCritical, "anthropic/claude-3.5-sonnet"),
                (CostOptimized, "meta-llama/llama-3.1-70b-instruct"),
            ]),
            capabilities: ALL_CAPS,
            max_context_tokens: 128_000,
            cost_per_1k_tokens: 0.002,
            specialties: vec![],
        },
        ProviderDescriptor {
            id: ProviderId::OpenAI,
            name: "OpenAI".into(),
            enabled: false,
            has_credentials: false,
            base_url: "https://api.openai.com/v1".into(),
            default_model: "gpt-4o".into(),
            models: models(&[(CostOptimized, "gpt-4o-mini"), (Conversational, "gpt-4o-mini")]),
            capabilities: ALL_CAPS,
            max_context_tokens: 128_000,
            cost_per_1k_tokens: 0.03,
            specialties: vec![StructuredOutput, ToolExecution],
        },
        ProviderDescriptor {
            id: ProviderId::Gemini,
            name: "Google Gemini".into(),
            enabled: false,
            has_credentials: false,
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            default_model: "gemini-1.5-pro".into(),
            models: models(&[
                (Conversational, "gemini-1.5-flash"),
                (CostOptimized, "gemini-1.5-flash"),
            ]),
            capabilities: ALL_CAPS,
            max_context_tokens: 1_000_000,
            cost_per_1k_tokens: 0.00125,
            specialties: vec![Multimodal, DataAnalysis],
        },
        ProviderDescriptor {
            id: ProviderId::Claude,
            name: "Anthropic Claude".into(),
            enabled: false,
            has_credentials: false,
            base_url: "https://api.anthropic.com".into(),
            default_model: "claude-sonnet-4-20250514".into(),
            models: models(&[(CostOptimized, "claude-3-5-haiku-latest")]),
            capabilities: CapabilityFlags {
                json_mode: false,
                function_calling: true,
                vision: true,
                streaming: true,
            },
            max_context_tokens: 200_000,
            cost_per_1k_tokens: 0.015,
            specialties: vec![CodeGeneration, CreativeWriting, ComplexReasoning, SafetyCritical],
        },
        ProviderDescriptor {
            id: ProviderId::Grok,
            name: "xAI Grok".into(),
            enabled: false,
            has_credentials: false,
            base_url: "https://api.x.ai/v1".into(),
            default_model: "grok-2-latest".into(),
            models: HashMap::new(),
            capabilities: CapabilityFlags {
                json_mode: true,
                function_calling: true,
                vision: false,
                streaming: true,
            },
            max_context_tokens: 131_072,
            cost_per_1k_tokens: 0.005,
            specialties: vec![RealtimeInfo, Conversational],
        },
        ProviderDescriptor {
            id: ProviderId::DeepSeek,
            name: "DeepSeek".into(),
            enabled: false,
            has_credentials: false,
            base_url: "https://api.deepseek.com/v1".into(),
            default_model: "deepseek-chat".into(),
            models: models(&[
                (MathReasoning, "deepseek-reasoner"),
                (ComplexReasoning, "deepseek-reasoner"),
            ]),
            capabilities: CapabilityFlags {
                json_mode: true,
                function_calling: true,
                vision: false,
                streaming: true,
            },
            max_context_tokens: 64_000,
            cost_per_1k_tokens: 0.0014,
            specialties: vec![MathReasoning, CodeGeneration, CostOptimized],
        },
    ]
}

// ---------------------------------------------------------------------------
// Task -> provider mapping
// ---------------------------------------------------------------------------

/// Preferred providers for one task category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProviderMapping {
    pub category: TaskCategory,
    pub primary: ProviderId,
    pub secondary: Vec<ProviderId>,
    pub rationale: &'static str,
    pub optimal_temperature: f64,
    pub required_capabilities: Vec<Capability>,
}

impl TaskProviderMapping {
    pub fn for_category(category: TaskCategory) -> Self {
        use ProviderId::*;

        let (primary, secondary, rationale, optimal_temperature, required_capabilities) =
            match category {
                TaskCategory::StructuredOutput => (
                    OpenAI,
                    vec![Gemini, Claude, DeepSeek],
                    "Native JSON mode gives the most reliable parseable output",
                    0.2,
                    vec![Capability::JsonMode],
                ),
                TaskCategory::CodeGeneration => (
                    Claude,
                    vec![OpenAI, DeepSeek, Gemini],
                    "Strongest on multi-file code and idiomatic fixes",
                    0.1,
                    vec![],
                ),
                TaskCategory::CreativeWriting => (
                    Claude,
                    vec![OpenAI, Gemini],
                    "Most varied prose with the fewest clichés",
                    0.8,
                    vec![],
                ),
                TaskCategory::ComplexReasoning => (
                    Claude,
                    vec![OpenAI, Gemini, DeepSeek],
                    "Long, well-structured chains of reasoning",
                    0.4,
                    vec![],
                ),
                TaskCategory::ToolExecution => (
                    OpenAI,
                    vec![Claude, Gemini],
                    "Most mature function-calling interface",
                    0.1,
                    vec![Capability::FunctionCalling],
                ),
                TaskCategory::DataAnalysis => (
                    Gemini,
                    vec![OpenAI, Claude, DeepSeek],
                    "Large context window for tabular input",
                    0.2,
                    vec![],
                ),
                TaskCategory::MathReasoning => (
                    DeepSeek,
                    vec![OpenAI, Claude, Gemini],
                    "Reasoning model tuned for math at low cost",
                    0.1,
                    vec![],
                ),
                TaskCategory::Conversational => (
                    Gemini,
                    vec![Claude, OpenAI, Grok],
                    "Fast and cheap for casual exchanges",
                    0.7,
                    vec![],
                ),
                TaskCategory::RealtimeInfo => (
                    Grok,
                    vec![Gemini, OpenAI],
                    "Freshest knowledge of current events",
                    0.6,
                    vec![],
                ),
                TaskCategory::Multimodal => (
                    Gemini,
                    vec![OpenAI, Claude],
                    "Native image and document understanding",
                    0.3,
                    vec![Capability::Vision],
                ),
                TaskCategory::SafetyCritical => (
                    Claude,
                    vec![OpenAI],
                    "Most conservative on harmful or risky content",
                    0.3,
                    vec![],
                ),
                TaskCategory::CostOptimized => (
                    DeepSeek,
                    vec![Gemini, Grok],
                    "Lowest cost per token with acceptable quality",
                    0.5,
                    vec![],
                ),
            };

        Self {
            category,
            primary,
            secondary,
            rationale,
            optimal_temperature,
            required_capabilities,
        }
    }

    /// Primary followed by secondaries.
    pub fn ordered(&self) -> impl Iterator<Item = ProviderId> + '_ {
        std::iter::once(self.primary).chain(self.secondary.iter().copied())
    }
}

// ---------------------------------------------------------------------------
// Tier policy
// ---------------------------------------------------------------------------

/// Cost policy for a user tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierPolicy {
    pub tier: UserTier,
    /// Maximum USD per 1k tokens a direct API may cost.
    pub cost_ceiling: f64,
    pub allows_retries: bool,
    pub prioritizes_cost: bool,
    pub preferred: &'static [ProviderId],
}

impl TierPolicy {
    pub fn for_tier(tier: UserTier) -> Self {
        use ProviderId::*;

        match tier {
            UserTier::Free => Self {
                tier,
                cost_ceiling: 0.01,
                allows_retries: false,
                prioritizes_cost: true,
                preferred: &[Gemini, DeepSeek, Grok],
            },
            UserTier::Standard => Self {
                tier,
                cost_ceiling: 0.05,
                allows_retries: true,
                prioritizes_cost: false,
                preferred: &[Gemini, Claude, OpenAI, DeepSeek],
            },
            UserTier::Premium => Self {
                tier,
                cost_ceiling: 0.10,
                allows_retries: true,
                prioritizes_cost: false,
                preferred: &[Claude, OpenAI, Gemini],
            },
            UserTier::Enterprise => Self {
                tier,
                cost_ceiling: f64::INFINITY,
                allows_retries: true,
                prioritizes_cost: false,
                preferred: &[OpenAI, Claude, Gemini],
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderCatalog
// ---------------------------------------------------------------------------

/// Read-only view of every provider, built once at startup.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    descriptors: BTreeMap<ProviderId, ProviderDescriptor>,
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ProviderCatalog {
    /// Built-in descriptors: self-hosted usable, everything else disabled
    /// until credentials are supplied.
    pub fn with_defaults() -> Self {
        Self {
            descriptors: default_descriptors()
                .into_iter()
                .map(|d| (d.id, d))
                .collect(),
        }
    }

    /// Build from a config snapshot: credentials, enablement and overrides.
    pub fn from_config(config: &RelayConfig) -> Self {
        let mut catalog = Self::with_defaults();

        for desc in catalog.descriptors.values_mut() {
            let key = desc.id.as_str();
            let settings = config.provider_settings(key);

            if desc.id == ProviderId::SelfHosted {
                desc.base_url = config.self_hosted_url.clone();
                desc.default_model = config.self_hosted_model.clone();
            } else {
                desc.has_credentials = config.api_key(key).is_some();
                desc.enabled = desc.has_credentials;
            }

            if let Some(enabled) = settings.enabled {
                desc.enabled = enabled;
            }
            if let Some(url) = settings.base_url {
                desc.base_url = url;
            }
            if let Some(model) = settings.model {
                desc.default_model = model;
                desc.models.clear();
            }
            if let Some(cost) = settings.cost_per_1k_tokens {
                desc.cost_per_1k_tokens = cost.max(0.0);
            }

            debug!(
                provider = %desc.id,
                enabled = desc.enabled,
                credentials = desc.has_credentials,
                "catalog entry"
            );
        }

        catalog
    }

    pub fn with_descriptor(mut self, descriptor: ProviderDescriptor) -> Self {
        self.descriptors.insert(descriptor.id, descriptor);
        self
    }

    pub fn with_credentials(mut self, id: ProviderId, has_credentials: bool) -> Self {
        if let Some(d) = self.descriptors.get_mut(&id) {
            d.has_credentials = has_credentials;
        }
        self
    }

    pub fn with_enabled(mut self, id: ProviderId, enabled: bool) -> Self {
        if let Some(d) = self.descriptors.get_mut(&id) {
            d.enabled = enabled;
        }
        self
    }

    /// Enable and credential a provider in one step.
    pub fn with_usable(self, id: ProviderId) -> Self {
        self.with_enabled(id, true).with_credentials(id, true)
    }

    pub fn get(&self, id: ProviderId) -> Option<&ProviderDescriptor> {
        self.descriptors.get(&id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.descriptors.values()
    }

    /// The descriptor, if the provider may be invoked at all.
    pub fn ensure_usable(&self, id: ProviderId) -> Result<&ProviderDescriptor, ProviderError> {
        let desc = self
            .descriptors
            .get(&id)
            .ok_or_else(|| ProviderError::Unavailable(format!("{id} is not configured")))?;
        if !desc.enabled {
            return Err(ProviderError::Unavailable(format!("{id} is disabled")));
        }
        if !desc.has_credentials {
            return Err(ProviderError::Unavailable(format!("{id} has no credentials")));
        }
        Ok(desc)
    }

    pub fn mapping(&self, category: TaskCategory) -> TaskProviderMapping {
        TaskProviderMapping::for_category(category)
    }

    /// Model slug to request from the gateway for a category.
    pub fn gateway_model(&self, category: TaskCategory) -> String {
        self.get(ProviderId::Gateway)
            .map(|d| d.model_for(category).to_string())
            .unwrap_or_else(|| "openai/gpt-4o-mini".into())
    }

    /// Cost-aware choice of an untried vendor API.
    ///
    /// Returns `None` when no candidate survives the filters; callers skip
    /// the phase in that case.
    pub fn select_direct_api(
        &self,
        category: TaskCategory,
        tier: UserTier,
        tried: &[ProviderId],
    ) -> Option<ProviderId> {
        let policy = TierPolicy::for_tier(tier);
        let mapping = self.mapping(category);

        let candidates: Vec<&ProviderDescriptor> = ProviderId::DIRECT_API
            .iter()
            .filter_map(|id| self.descriptors.get(id))
            .filter(|d| {
                d.is_usable()
                    && d.cost_per_1k_tokens <= policy.cost_ceiling
                    && !tried.contains(&d.id)
                    && d.supports_all(&mapping.required_capabilities)
            })
            .collect();

        if candidates.is_empty() {
            debug!(%category, %tier, "no direct API candidates");
            return None;
        }

        let cheapest = || {
            candidates
                .iter()
                .min_by(|a, b| a.cost_per_1k_tokens.total_cmp(&b.cost_per_1k_tokens))
                .map(|d| d.id)
        };

        if policy.prioritizes_cost {
            return cheapest();
        }

        let available = |id: &ProviderId| candidates.iter().any(|d| d.id == *id);

        if let Some(id) = mapping.ordered().find(|id| available(id)) {
            return Some(id);
        }
        if let Some(id) = policy.preferred.iter().copied().find(|id| available(id)) {
            return Some(id);
        }
        cheapest()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn all_direct_usable() -> ProviderCatalog {
        ProviderId::DIRECT_API
            .into_iter()
            .fold(ProviderCatalog::with_defaults(), |c, id| c.with_usable(id))
    }

    #[test]
    fn defaults_only_self_hosted_usable() {
        let catalog = ProviderCatalog::with_defaults();
        assert!(catalog.ensure_usable(ProviderId::SelfHosted).is_ok());
        for id in ProviderId::DIRECT_API {
            assert!(matches!(
                catalog.ensure_usable(id),
                Err(ProviderError::Unavailable(_))
            ));
        }
    }

    #[test]
    fn ensure_usable_distinguishes_disabled_and_missing_credentials() {
        let catalog = ProviderCatalog::with_defaults()
            .with_enabled(ProviderId::Grok, true)
            .with_credentials(ProviderId::Claude, true);

        let grok = catalog.ensure_usable(ProviderId::Grok).unwrap_err();
        assert!(grok.to_string().contains("no credentials"));
        let claude = catalog.ensure_usable(ProviderId::Claude).unwrap_err();
        assert!(claude.to_string().contains("disabled"));
    }

    #[test]
    fn mapping_covers_every_category() {
        for category in TaskCategory::ALL {
            let m = TaskProviderMapping::for_category(category);
            assert_eq!(m.category, category);
            assert!(m.primary.is_direct_api());
            assert!(!m.secondary.contains(&m.primary));
            assert!(!m.rationale.is_empty());
        }
    }

    #[test]
    fn free_tier_picks_cheapest() {
        let catalog = all_direct_usable();
        let pick = catalog.select_direct_api(TaskCategory::CodeGeneration, UserTier::Free, &[]);
        assert_eq!(pick, Some(ProviderId::Gemini));

        let pick = catalog.select_direct_api(
            TaskCategory::CodeGeneration,
            UserTier::Free,
            &[ProviderId::Gemini],
        );
        assert_eq!(pick, Some(ProviderId::DeepSeek));
    }

    #[test]
    fn free_tier_ceiling_excludes_expensive_providers() {
        let catalog = ProviderCatalog::with_defaults()
            .with_usable(ProviderId::OpenAI)
            .with_usable(ProviderId::Claude);
        assert_eq!(
            catalog.select_direct_api(TaskCategory::StructuredOutput, UserTier::Free, &[]),
            None
        );
    }

    #[test]
    fn standard_tier_follows_mapping_order() {
        let catalog = all_direct_usable();
        assert_eq!(
            catalog.select_direct_api(TaskCategory::StructuredOutput, UserTier::Standard, &[]),
            Some(ProviderId::OpenAI)
        );
        assert_eq!(
            catalog.select_direct_api(
                TaskCategory::StructuredOutput,
                UserTier::Standard,
                &[ProviderId::OpenAI]
            ),
            Some(ProviderId::Gemini)
        );
    }

    #[test]
    fn falls_back_to_tier_preference_then_cheapest() {
        // Realtime-info maps to grok, gemini, openai. Only claude and deepseek usable.
        let catalog = ProviderCatalog::with_defaults()
            .with_usable(ProviderId::Claude)
            .with_usable(ProviderId::DeepSeek);
        assert_eq!(
            catalog.select_direct_api(TaskCategory::RealtimeInfo, UserTier::Premium, &[]),
            Some(ProviderId::Claude)
        );
        assert_eq!(
            catalog.select_direct_api(
                TaskCategory::RealtimeInfo,
                UserTier::Premium,
                &[ProviderId::Claude]
            ),
            Some(ProviderId::DeepSeek)
        );
    }

    #[test]
    fn required_capabilities_filter_candidates() {
        // Claude has no JSON mode, so structured output skips it even on premium.
        let catalog = ProviderCatalog::with_defaults()
            .with_usable(ProviderId::Claude)
            .with_usable(ProviderId::DeepSeek);
        assert_eq!(
            catalog.select_direct_api(TaskCategory::StructuredOutput, UserTier::Premium, &[]),
            Some(ProviderId::DeepSeek)
        );
        assert_eq!(
            catalog.select_direct_api(
                TaskCategory::StructuredOutput,
                UserTier::Premium,
                &[ProviderId::DeepSeek]
            ),
            None
        );
        // Multimodal needs vision; deepseek alone cannot serve it.
        let catalog = ProviderCatalog::with_defaults().with_usable(ProviderId::DeepSeek);
        assert_eq!(
            catalog.select_direct_api(TaskCategory::Multimodal, UserTier::Standard, &[]),
            None
        );
    }

    #[test]
    fn all_tried_yields_none() {
        let catalog = all_direct_usable();
        assert_eq!(
            catalog.select_direct_api(
                TaskCategory::Conversational,
                UserTier::Enterprise,
                &ProviderId::DIRECT_API
            ),
            None
        );
    }

    #[test]
    fn from_config_reads_keys_and_overrides() {
        let mut config = RelayConfig::default();
        config.set_api_key("openai", Some("sk".into()));
        config.set_api_key("grok", Some("xai".into()));
        config.self_hosted_model = "qwen2.5:14b".into();
        config.providers.insert(
            "grok".into(),
            relay_core::ProviderSettings {
                enabled: Some(false),
                ..Default::default()
            },
        );
        config.providers.insert(
            "gateway".into(),
            relay_core::ProviderSettings {
                model: Some("openrouter/auto".into()),
                ..Default::default()
            },
        );

        let catalog = ProviderCatalog::from_config(&config);
        assert!(catalog.ensure_usable(ProviderId::OpenAI).is_ok());
        assert!(catalog.ensure_usable(ProviderId::Grok).is_err());
        assert!(catalog.ensure_usable(ProviderId::Claude).is_err());
        assert_eq!(
            catalog.get(ProviderId::SelfHosted).unwrap().default_model,
            "qwen2.5:14b"
        );
        assert_eq!(catalog.gateway_model(TaskCategory::MathReasoning), "openrouter/auto");
    }

    #[test]
    fn gateway_model_is_category_specific() {
        let catalog = ProviderCatalog::with_defaults();
        assert_eq!(catalog.gateway_model(TaskCategory::MathReasoning), "deepseek/deepseek-r1");
        assert_eq!(catalog.gateway_model(TaskCategory::Conversational), "openai/gpt-4o-mini");
    }

    #[test]
    fn required_capabilities_supported_by_primary() {
        let catalog = ProviderCatalog::with_defaults();
        for category in TaskCategory::ALL {
            let m = catalog.mapping(category);
            let primary = catalog.get(m.primary).unwrap();
            assert!(primary.supports_all(&m.required_capabilities), "{category}");
        }
    }
}

//! Router service: wiring layer.
//!
//! Builds the catalog, HTTP providers, circuit breaker, score history and
//! orchestrator from a config snapshot and exposes a single `route` call.

use std::sync::Arc;

use relay_core::RelayConfig;
use tracing::{debug, info};

use crate::catalog::ProviderCatalog;
use crate::history::InMemoryScoreHistory;
use crate::invoker::{HttpInvoker, ModelInvoker};
use crate::providers::AiProvider;
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::openai_compat::OpenAiCompatibleProvider;
use crate::routing::{
    BreakerConfig, CircuitBreaker, OrchestratorSettings, RouteRequest, RouterError,
    RoutingOrchestrator, RoutingResult,
};
use crate::types::ProviderId;

pub struct RouterService {
    catalog: Arc<ProviderCatalog>,
    breaker: Arc<CircuitBreaker>,
    history: Arc<InMemoryScoreHistory>,
    registered: Vec<ProviderId>,
    orchestrator: RoutingOrchestrator,
}

impl RouterService {
    pub fn new(config: &RelayConfig) -> Self {
        let catalog = Arc::new(ProviderCatalog::from_config(config));
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::from_config(config)));
        let http = register_providers(config, Arc::clone(&breaker));
        let registered = http.provider_ids();
        let history = Arc::new(InMemoryScoreHistory::new());

        let invoker = ModelInvoker::new(Arc::clone(&catalog), Arc::new(http))
            .with_max_tokens(config.max_tokens);
        let orchestrator = RoutingOrchestrator::new(invoker)
            .with_settings(OrchestratorSettings::from_config(config))
            .with_history_reader(history.clone())
            .with_score_sink(history.clone());

        Self {
            catalog,
            breaker,
            history,
            registered,
            orchestrator,
        }
    }

    pub async fn route(&self, request: RouteRequest) -> Result<RoutingResult, RouterError> {
        self.orchestrator.route(request).await
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn history(&self) -> &Arc<InMemoryScoreHistory> {
        &self.history
    }

    pub fn orchestrator(&self) -> &RoutingOrchestrator {
        &self.orchestrator
    }

    /// Providers with a live HTTP client.
    pub fn registered_providers(&self) -> &[ProviderId] {
        &self.registered
    }
}

/// Self-hosted is always registered; everything else only with a key.
fn register_providers(config: &RelayConfig, breaker: Arc<CircuitBreaker>) -> HttpInvoker {
    let mut http = HttpInvoker::new(breaker);

    let self_hosted_url = config
        .provider_settings(ProviderId::SelfHosted.as_str())
        .base_url
        .unwrap_or_else(|| config.self_hosted_url.clone());
    debug!("Self-hosted provider registered at {}", self_hosted_url);
    http.register(Arc::new(OpenAiCompatibleProvider::self_hosted(
        self_hosted_url,
        config
            .api_key(ProviderId::SelfHosted.as_str())
            .map(str::to_string),
    )));

    for id in ProviderId::ALL {
        let Some(key) = config.api_key(id.as_str()) else {
            continue;
        };
        let key = key.to_string();
        let base_url = config.provider_settings(id.as_str()).base_url;

        let provider: Arc<dyn AiProvider> = match id {
            ProviderId::SelfHosted => continue,
            ProviderId::Gateway => Arc::new(OpenAiCompatibleProvider::openrouter(key, base_url)),
            ProviderId::OpenAI => Arc::new(OpenAiCompatibleProvider::openai(key, base_url)),
            ProviderId::Gemini => Arc::new(OpenAiCompatibleProvider::gemini(key, base_url)),
            ProviderId::Grok => Arc::new(OpenAiCompatibleProvider::grok(key, base_url)),
            ProviderId::DeepSeek => Arc::new(OpenAiCompatibleProvider::deepseek(key, base_url)),
            ProviderId::Claude => Arc::new(AnthropicProvider::new(key, base_url)),
        };
        info!("{} provider registered", provider.name());
        http.register(provider);
    }

    info!("{} AI provider(s) registered", http.provider_ids().len());
    http
}

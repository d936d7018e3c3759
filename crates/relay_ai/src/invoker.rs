//! Model invocation.
//!
//! [`ModelInvoker`] turns a (provider, category, temperature) choice into a
//! live [`ModelHandle`]; the handle sends chats through an [`Invoker`]. The
//! production invoker, [`HttpInvoker`], dispatches to registered
//! [`AiProvider`]s behind the shared [`CircuitBreaker`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::ProviderCatalog;
use crate::providers::{AiProvider, ProviderError};
use crate::routing::circuit_breaker::{CircuitBreaker, FailureReason};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, ProviderId, TaskCategory};

/// Default completion budget when none is configured.
const DEFAULT_MAX_TOKENS: u32 = 4096;

// ---------------------------------------------------------------------------
// Target / trait
// ---------------------------------------------------------------------------

/// A fully resolved invocation target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelTarget {
    pub provider: ProviderId,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        target: &ModelTarget,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> Result<ChatResponse, ProviderError>;

    /// The caller gave up on an in-flight `invoke` after its attempt
    /// timeout. The dropped future reports nothing itself.
    fn record_timeout(&self, _target: &ModelTarget) {}
}

// ---------------------------------------------------------------------------
// ModelHandle
// ---------------------------------------------------------------------------

/// A provider/model/temperature triple bound to an invoker, ready to chat.
#[derive(Clone)]
pub struct ModelHandle {
    target: ModelTarget,
    invoker: Arc<dyn Invoker>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl ModelHandle {
    pub fn target(&self) -> &ModelTarget {
        &self.target
    }

    pub fn provider(&self) -> ProviderId {
        self.target.provider
    }

    pub fn model(&self) -> &str {
        &self.target.model
    }

    pub fn temperature(&self) -> f64 {
        self.target.temperature
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> Result<ChatResponse, ProviderError> {
        self.invoker
            .invoke(&self.target, messages, system_prompt)
            .await
    }

    /// Report a call through this handle that was abandoned on timeout.
    pub fn report_timeout(&self) {
        self.invoker.record_timeout(&self.target);
    }
}

// ---------------------------------------------------------------------------
// ModelInvoker
// ---------------------------------------------------------------------------

/// Resolves handles against the catalog. Availability is checked here, before
/// any network traffic.
#[derive(Clone)]
pub struct ModelInvoker {
    catalog: Arc<ProviderCatalog>,
    invoker: Arc<dyn Invoker>,
    max_tokens: u32,
}

impl ModelInvoker {
    pub fn new(catalog: Arc<ProviderCatalog>, invoker: Arc<dyn Invoker>) -> Self {
        Self {
            catalog,
            invoker,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn handle(
        &self,
        provider: ProviderId,
        category: TaskCategory,
        temperature: f64,
    ) -> Result<ModelHandle, ProviderError> {
        let desc = self.catalog.ensure_usable(provider)?;

        let model = if provider == ProviderId::Gateway {
            self.catalog.gateway_model(category)
        } else {
            desc.model_for(category).to_string()
        };

        debug!(%provider, %model, %category, temperature, "model handle resolved");

        Ok(ModelHandle {
            target: ModelTarget {
                provider,
                model,
                temperature,
                max_tokens: self.max_tokens,
            },
            invoker: Arc::clone(&self.invoker),
        })
    }
}

// ---------------------------------------------------------------------------
// HttpInvoker
// ---------------------------------------------------------------------------

/// Dispatches to registered providers; every outcome feeds the breaker.
pub struct HttpInvoker {
    providers: HashMap<ProviderId, Arc<dyn AiProvider>>,
    breaker: Arc<CircuitBreaker>,
}

impl HttpInvoker {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            providers: HashMap::new(),
            breaker,
        }
    }

    /// Register a provider under its own id, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn AiProvider>) {
        self.providers.insert(provider.provider_id(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.providers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        target: &ModelTarget,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> Result<ChatResponse, ProviderError> {
        let id = target.provider;
        let provider = self
            .providers
            .get(&id)
            .ok_or_else(|| ProviderError::Unavailable(format!("{id} has no registered client")))?;

        if !self.breaker.allow(id) {
            debug!(provider = %id, "circuit open, skipping call");
            return Err(ProviderError::CircuitOpen(id));
        }

        let request = ChatRequest {
            messages: messages.to_vec(),
            model: target.model.clone(),
            max_tokens: target.max_tokens,
            temperature: Some(target.temperature as f32),
            system_prompt: system_prompt.map(str::to_string),
        };

        match provider.chat(&request).await {
            Ok(response) => {
                self.breaker.record_success(id);
                Ok(response)
            }
            Err(e) => {
                warn!(provider = %id, model = %target.model, "invocation failed: {e}");
                if !e.is_unavailable() {
                    self.breaker
                        .record_failure(id, FailureReason::from_provider_error(&e));
                }
                Err(e)
            }
        }
    }

    fn record_timeout(&self, target: &ModelTarget) {
        warn!(provider = %target.provider, model = %target.model, "invocation timed out");
        self.breaker
            .record_failure(target.provider, FailureReason::Timeout);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Routing Orchestrator
//!
//! Drives one request through the provider phases: self-hosted first, an
//! optional self-hosted retry, a cost-selected vendor API, the gateway, then a
//! last-resort self-hosted call. Every response is graded; the first ACCEPT
//! wins, otherwise the best graded attempt does. Only a failed EMERGENCY call
//! surfaces as an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_core::RelayConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::attempt_chain::{AttemptChain, ChainOutcome, PhaseRunner, StepOutcome};
use super::scorer::{Decision, EvaluationInput, ResponseScorer, ScoreResult};
use super::task_classifier::{ClassificationHint, ClassificationResult, TaskClassifier};
use super::temperature::{TemperatureAdvisor, TemperatureRecommendation, TemperatureRequest};
use crate::catalog::TierPolicy;
use crate::cost::{estimate_cost, estimate_tokens};
use crate::history::{HistoricalReader, HistoricalStats, ScoreRecord, ScoreSink};
use crate::invoker::{ModelHandle, ModelInvoker};
use crate::types::{ChatMessage, MessageRole, ProviderId, TaskCategory, UserTier};

/// Confidence reported for a winner that was never scored.
const UNSCORED_CONFIDENCE: f64 = 50.0;

/// Upper bound on SELF_HOSTED_RETRY attempts, whatever the caller asks for.
const MAX_SELF_HOSTED_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    SelfHosted,
    SelfHostedRetry,
    DirectApi,
    Gateway,
    SelfHostedFallback,
    Emergency,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfHosted => "SELF_HOSTED",
            Self::SelfHostedRetry => "SELF_HOSTED_RETRY",
            Self::DirectApi => "DIRECT_API",
            Self::Gateway => "GATEWAY",
            Self::SelfHostedFallback => "SELF_HOSTED_FALLBACK",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the routing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub phase: Phase,
    pub provider: ProviderId,
}

impl std::fmt::Display for PathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.phase, self.provider)
    }
}

fn format_path(path: &[PathEntry]) -> String {
    if path.is_empty() {
        return "no attempts".into();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingOptions {
    /// Skip classification and use this category.
    pub task_category: Option<TaskCategory>,
    pub user_specified_temperature: Option<f64>,
    pub user_tier: Option<UserTier>,
    /// Only this provider's phase runs; its first response is returned.
    pub force_provider: Option<ProviderId>,
    pub enable_scoring: bool,
    pub max_retries: Option<u32>,
    /// Per-attempt timeout.
    pub timeout_ms: Option<u64>,
    /// Overall budget after which remaining phases are skipped.
    pub deadline_ms: Option<u64>,
    pub classification_hint: Option<ClassificationHint>,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            task_category: None,
            user_specified_temperature: None,
            user_tier: None,
            force_provider: None,
            enable_scoring: true,
            max_retries: None,
            timeout_ms: None,
            deadline_ms: None,
            classification_hint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub options: RoutingOptions,
}

impl RouteRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            options: RoutingOptions::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_options(mut self, options: RoutingOptions) -> Self {
        self.options = options;
        self
    }
}

/// Append-only record of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingAttempt {
    pub phase: Phase,
    pub provider: ProviderId,
    pub model: String,
    pub temperature: f64,
    pub response: Option<String>,
    pub latency_ms: u64,
    pub score: Option<f64>,
    pub decision: Decision,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingResult {
    /// Live handle to the winning model, for follow-up turns.
    #[serde(skip)]
    pub model_handle: ModelHandle,
    pub provider_id: ProviderId,
    pub model: String,
    pub temperature: f64,
    pub task_category: TaskCategory,
    /// Present when the category was inferred rather than given.
    pub classification: Option<ClassificationResult>,
    /// Winning score, or 50 when scoring was off.
    pub confidence: f64,
    pub routing_path: Vec<PathEntry>,
    pub score_result: Option<ScoreResult>,
    pub temperature_recommendation: TemperatureRecommendation,
    pub attempts: Vec<RoutingAttempt>,
    pub content: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("All providers failed [{}]: {}", format_path(.routing_path), .errors.join("; "))]
    AllProvidersFailed {
        routing_path: Vec<PathEntry>,
        errors: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub default_tier: UserTier,
    pub attempt_timeout: Duration,
    pub request_deadline: Option<Duration>,
    pub history_window_days: u32,
    pub scoring_enabled: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_tier: UserTier::Standard,
            attempt_timeout: Duration::from_secs(30),
            request_deadline: None,
            history_window_days: 7,
            scoring_enabled: true,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        let default_tier = config.default_tier.parse().unwrap_or_else(|e| {
            warn!("{e}; falling back to standard tier");
            UserTier::Standard
        });
        Self {
            default_tier,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms.max(1)),
            request_deadline: config.request_deadline_ms.map(Duration::from_millis),
            history_window_days: config.history_window_days,
            scoring_enabled: config.scoring_enabled,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-request state
// ---------------------------------------------------------------------------

struct AttemptRecord {
    attempt: RoutingAttempt,
    handle: ModelHandle,
    recommendation: TemperatureRecommendation,
    score_result: Option<ScoreResult>,
}

struct RouteState {
    messages: Vec<ChatMessage>,
    system_prompt: Option<String>,
    category: TaskCategory,
    tier: UserTier,
    forced: Option<ProviderId>,
    user_temperature: Option<f64>,
    max_retries: u32,
    scoring: bool,
    attempt_timeout: Duration,
    deadline: Option<Instant>,
    records: Vec<AttemptRecord>,
    routing_path: Vec<PathEntry>,
    errors: Vec<String>,
    tried_direct: Vec<ProviderId>,
    winner: Option<usize>,
}

impl RouteState {
    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time the next call may take: the attempt timeout, cut short by the
    /// request deadline. `None` once the deadline has passed.
    fn attempt_budget(&self) -> Option<Duration> {
        let Some(deadline) = self.deadline else {
            return Some(self.attempt_timeout);
        };
        let left = deadline.saturating_duration_since(Instant::now());
        (!left.is_zero()).then(|| left.min(self.attempt_timeout))
    }

    fn attempted(&self, provider: ProviderId) -> bool {
        self.records.iter().any(|r| r.attempt.provider == provider)
    }

    fn premium_requested(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.attempt.decision == Decision::ForcePremium)
    }

    /// Highest-scoring attempt with a response; unscored counts as 50 and
    /// the earliest wins ties.
    fn best_usable(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, r) in self.records.iter().enumerate() {
            if r.attempt.response.is_none() {
                continue;
            }
            let score = r.attempt.score.unwrap_or(UNSCORED_CONFIDENCE);
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }

    fn into_result(
        self,
        index: usize,
        classification: Option<ClassificationResult>,
    ) -> RoutingResult {
        let category = self.category;
        let routing_path = self.routing_path;
        let mut records = self.records;
        let attempts: Vec<RoutingAttempt> = records.iter().map(|r| r.attempt.clone()).collect();
        let AttemptRecord {
            attempt,
            handle,
            recommendation,
            score_result,
        } = records.swap_remove(index);

        RoutingResult {
            provider_id: attempt.provider,
            model: attempt.model,
            temperature: attempt.temperature,
            task_category: category,
            classification,
            confidence: attempt.score.unwrap_or(UNSCORED_CONFIDENCE),
            routing_path,
            score_result,
            temperature_recommendation: recommendation,
            attempts,
            content: attempt.response.unwrap_or_default(),
            model_handle: handle,
        }
    }
}

fn self_hosted_eligible(s: &RouteState) -> bool {
    s.forced.is_none_or(|p| p == ProviderId::SelfHosted)
}

fn retry_eligible(s: &RouteState) -> bool {
    s.max_retries > 0
        && self_hosted_eligible(s)
        && s.records.last().is_some_and(|r| {
            r.attempt.phase == Phase::SelfHosted && r.attempt.decision == Decision::RetrySelfHosted
        })
}

fn direct_api_eligible(s: &RouteState) -> bool {
    s.forced.is_none_or(|p| p.is_direct_api())
}

fn gateway_eligible(s: &RouteState) -> bool {
    s.forced.is_none_or(|p| p == ProviderId::Gateway)
}

fn fallback_eligible(s: &RouteState) -> bool {
    s.forced.is_none() && !s.attempted(ProviderId::SelfHosted)
}

fn routing_chain() -> AttemptChain<Phase, RouteState> {
    AttemptChain::new()
        .step(Phase::SelfHosted, self_hosted_eligible)
        .step(Phase::SelfHostedRetry, retry_eligible)
        .step(Phase::DirectApi, direct_api_eligible)
        .step(Phase::Gateway, gateway_eligible)
        .step(Phase::SelfHostedFallback, fallback_eligible)
}

#[derive(Debug, Clone, Copy)]
enum TemperatureMode {
    Initial,
    Retry,
    LastResort,
}

// ---------------------------------------------------------------------------
// RoutingOrchestrator
// ---------------------------------------------------------------------------

/// Holds only immutable settings and shared collaborators; one instance can
/// serve any number of concurrent [`route`](Self::route) calls.
pub struct RoutingOrchestrator {
    classifier: TaskClassifier,
    advisor: TemperatureAdvisor,
    scorer: Arc<ResponseScorer>,
    invoker: ModelInvoker,
    reader: Option<Arc<dyn HistoricalReader>>,
    sink: Option<Arc<dyn ScoreSink>>,
    settings: OrchestratorSettings,
    chain: AttemptChain<Phase, RouteState>,
}

impl RoutingOrchestrator {
    pub fn new(invoker: ModelInvoker) -> Self {
        Self {
            classifier: TaskClassifier::new(),
            advisor: TemperatureAdvisor::new(),
            scorer: Arc::new(ResponseScorer::new()),
            invoker,
            reader: None,
            sink: None,
            settings: OrchestratorSettings::default(),
            chain: routing_chain(),
        }
    }

    pub fn with_scorer(mut self, scorer: ResponseScorer) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    pub fn with_history_reader(mut self, reader: Arc<dyn HistoricalReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_score_sink(mut self, sink: Arc<dyn ScoreSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    pub async fn route(&self, request: RouteRequest) -> Result<RoutingResult, RouterError> {
        let started = Instant::now();
        let RouteRequest {
            prompt,
            system_prompt,
            options,
        } = request;

        let (category, classification) = match options.task_category {
            Some(category) => (category, None),
            None => {
                let result = self
                    .classifier
                    .classify(&prompt, options.classification_hint.as_ref());
                (result.category, Some(result))
            }
        };

        let tier = options.user_tier.unwrap_or(self.settings.default_tier);
        let max_retries = if TierPolicy::for_tier(tier).allows_retries {
            options
                .max_retries
                .unwrap_or(1)
                .min(MAX_SELF_HOSTED_RETRIES)
        } else {
            0
        };

        let mut state = RouteState {
            messages: vec![ChatMessage::text(MessageRole::User, prompt)],
            system_prompt,
            category,
            tier,
            forced: options.force_provider,
            user_temperature: options.user_specified_temperature,
            max_retries,
            scoring: options.enable_scoring && self.settings.scoring_enabled,
            attempt_timeout: options
                .timeout_ms
                .map(|ms| Duration::from_millis(ms.max(1)))
                .unwrap_or(self.settings.attempt_timeout),
            deadline: options
                .deadline_ms
                .map(Duration::from_millis)
                .or(self.settings.request_deadline)
                .map(|d| started + d),
            records: Vec::new(),
            routing_path: Vec::new(),
            errors: Vec::new(),
            tried_direct: Vec::new(),
            winner: None,
        };

        info!(%category, %tier, forced = ?state.forced, "routing request");

        let outcome = self.chain.run(self, &mut state).await;
        if outcome == ChainOutcome::Interrupted {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request deadline reached, returning best attempt so far"
            );
        }

        let index = match state.winner.or_else(|| state.best_usable()) {
            Some(index) => index,
            None => self.emergency(&mut state).await?,
        };

        let result = state.into_result(index, classification);
        info!(
            provider = %result.provider_id,
            model = %result.model,
            confidence = result.confidence,
            path = %format_path(&result.routing_path),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request routed"
        );
        Ok(result)
    }

    async fn emergency(&self, state: &mut RouteState) -> Result<usize, RouterError> {
        warn!(category = %state.category, "no usable attempt, trying emergency self-hosted call");
        let index = self
            .attempt_provider(
                state,
                Phase::Emergency,
                ProviderId::SelfHosted,
                TemperatureMode::Initial,
            )
            .await;

        match index {
            Some(i) if state.records[i].attempt.response.is_some() => Ok(i),
            _ => Err(RouterError::AllProvidersFailed {
                routing_path: state.routing_path.clone(),
                errors: state.errors.clone(),
            }),
        }
    }

    async fn historical(
        &self,
        provider: ProviderId,
        category: TaskCategory,
    ) -> Option<HistoricalStats> {
        let reader = self.reader.as_ref()?;
        reader
            .recent_average(provider, category, self.settings.history_window_days)
            .await
    }

    async fn attempt_provider(
        &self,
        state: &mut RouteState,
        phase: Phase,
        provider: ProviderId,
        mode: TemperatureMode,
    ) -> Option<usize> {
        let historical = self.historical(provider, state.category).await;
        let request = TemperatureRequest::new(state.category)
            .provider(provider)
            .user_override(state.user_temperature)
            .historical(historical);
        let recommendation = match mode {
            TemperatureMode::Initial => self.advisor.recommend(&request),
            TemperatureMode::Retry => self.advisor.recommend(&request.retry(true)),
            TemperatureMode::LastResort => self.advisor.recommend_last_resort(&request),
        };

        self.invoke_and_score(state, phase, provider, recommendation, historical)
            .await
    }

    /// Run one invocation and append it to the audit trail. `None` means the
    /// provider was unusable and nothing was attempted.
    async fn invoke_and_score(
        &self,
        state: &mut RouteState,
        phase: Phase,
        provider: ProviderId,
        recommendation: TemperatureRecommendation,
        historical: Option<HistoricalStats>,
    ) -> Option<usize> {
        let Some(budget) = state.attempt_budget() else {
            debug!(%phase, %provider, "request deadline passed, attempt not started");
            state
                .errors
                .push(format!("{phase} {provider}: request deadline exceeded"));
            return None;
        };

        let temperature = recommendation.value;
        let handle = match self
            .invoker
            .handle(provider, state.category, temperature)
        {
            Ok(handle) => handle,
            Err(e) => {
                debug!(%phase, %provider, "provider unusable: {e}");
                state.errors.push(format!("{phase} {provider}: {e}"));
                return None;
            }
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            budget,
            handle.chat(&state.messages, state.system_prompt.as_deref()),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (response, error) = match outcome {
            Ok(Ok(response)) => (Some(response), None),
            Ok(Err(e)) => (None, Some(e.to_string())),
            Err(_) => {
                // A call cut short by the request deadline says nothing about
                // the provider's health.
                if budget == state.attempt_timeout {
                    handle.report_timeout();
                }
                (None, Some(format!("timed out after {} ms", budget.as_millis())))
            }
        };

        let mut score_result = None;
        let decision = match &response {
            Some(resp) if state.scoring => {
                let usage = resp.usage.completion_tokens;
                let input = EvaluationInput {
                    response_text: &resp.content,
                    category: state.category,
                    provider,
                    temperature,
                    latency_ms,
                    token_count: (usage > 0).then_some(usage),
                    error_count: None,
                    historical_average: historical.map(|h| h.average),
                };
                let result = self.scorer.score(&input, state.tier);
                self.emit(ScoreRecord::new(
                    provider,
                    handle.model(),
                    state.category,
                    state.tier,
                    result.score,
                    result.decision,
                    temperature,
                    latency_ms,
                ));
                let decision = result.decision;
                score_result = Some(result);
                decision
            }
            Some(_) => Decision::Accept,
            None => Decision::Reject,
        };

        let score = score_result.as_ref().map(|r| r.score);
        match &error {
            Some(e) => {
                warn!(%phase, %provider, model = %handle.model(), latency_ms, "attempt failed: {e}");
                state.errors.push(format!("{phase} {provider}: {e}"));
            }
            None => info!(
                %phase,
                %provider,
                model = %handle.model(),
                temperature,
                latency_ms,
                ?score,
                %decision,
                "attempt scored"
            ),
        }

        state.routing_path.push(PathEntry { phase, provider });
        state.records.push(AttemptRecord {
            attempt: RoutingAttempt {
                phase,
                provider,
                model: handle.model().to_string(),
                temperature,
                response: response.map(|r| r.content),
                latency_ms,
                score,
                decision,
                error,
            },
            handle,
            recommendation,
            score_result,
        });
        Some(state.records.len() - 1)
    }

    /// Hand a record to the sink without waiting; failures are only logged.
    fn emit(&self, record: ScoreRecord) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = sink.record_score(record).await {
                warn!("Failed to record score: {e}");
            }
        });
    }

    /// Halt on a response that was accepted, forced, or (for the last resort)
    /// any response at all.
    fn settle(state: &mut RouteState, index: Option<usize>, take_any: bool) -> StepOutcome {
        let Some(i) = index else {
            return StepOutcome::Skipped;
        };
        let attempt = &state.records[i].attempt;
        let done = attempt.response.is_some()
            && (take_any || state.forced.is_some() || attempt.decision == Decision::Accept);
        if done {
            state.winner = Some(i);
            StepOutcome::Halt
        } else {
            StepOutcome::Continue
        }
    }

    async fn run_retries(&self, state: &mut RouteState) -> StepOutcome {
        for n in 0..state.max_retries {
            if n > 0 && state.deadline_passed() {
                break;
            }
            let index = self
                .attempt_provider(
                    state,
                    Phase::SelfHostedRetry,
                    ProviderId::SelfHosted,
                    TemperatureMode::Retry,
                )
                .await;
            match Self::settle(state, index, false) {
                StepOutcome::Continue => {}
                other => return other,
            }
            let again = state
                .records
                .last()
                .is_some_and(|r| r.attempt.decision == Decision::RetrySelfHosted);
            if !again {
                break;
            }
        }
        StepOutcome::Continue
    }

    async fn run_direct_api(&self, state: &mut RouteState) -> StepOutcome {
        let tier = if state.premium_requested() && !state.tier.is_premium() {
            debug!(from = %state.tier, "escalating cost policy to premium");
            UserTier::Premium
        } else {
            state.tier
        };

        let selected = state.forced.or_else(|| {
            self.invoker
                .catalog()
                .select_direct_api(state.category, tier, &state.tried_direct)
        });
        let Some(provider) = selected else {
            debug!(category = %state.category, %tier, "no direct API candidate");
            return StepOutcome::Skipped;
        };
        state.tried_direct.push(provider);

        if let Some(desc) = self.invoker.catalog().get(provider) {
            let prompt_tokens: usize = state
                .messages
                .iter()
                .map(|m| estimate_tokens(&m.content))
                .sum();
            debug!(
                %provider,
                %tier,
                prompt_tokens,
                est_cost_usd = estimate_cost(
                    u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
                    desc.cost_per_1k_tokens
                ),
                "direct API provider selected"
            );
        }

        let index = self
            .attempt_provider(state, Phase::DirectApi, provider, TemperatureMode::Initial)
            .await;
        Self::settle(state, index, false)
    }
}

#[async_trait]
impl PhaseRunner<Phase, RouteState> for RoutingOrchestrator {
    async fn attempt(&self, phase: Phase, state: &mut RouteState) -> StepOutcome {
        match phase {
            Phase::SelfHosted => {
                let index = self
                    .attempt_provider(state, phase, ProviderId::SelfHosted, TemperatureMode::Initial)
                    .await;
                Self::settle(state, index, false)
            }
            Phase::SelfHostedRetry => self.run_retries(state).await,
            Phase::DirectApi => self.run_direct_api(state).await,
            Phase::Gateway => {
                let index = self
                    .attempt_provider(state, phase, ProviderId::Gateway, TemperatureMode::Initial)
                    .await;
                Self::settle(state, index, false)
            }
            Phase::SelfHostedFallback => {
                let index = self
                    .attempt_provider(
                        state,
                        phase,
                        ProviderId::SelfHosted,
                        TemperatureMode::LastResort,
                    )
                    .await;
                Self::settle(state, index, true)
            }
            // Runs outside the chain.
            Phase::Emergency => StepOutcome::Skipped,
        }
    }

    fn should_halt(&self, state: &RouteState) -> bool {
        state.deadline_passed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

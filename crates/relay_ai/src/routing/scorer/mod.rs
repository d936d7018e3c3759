//! Response Scorer
//!
//! Grades one provider response with four weighted factors (quality,
//! response time, token efficiency, error rate) and turns the aggregate into
//! a routing [`Decision`]. Pure: no I/O, no shared state.

pub mod quality;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cost::estimate_tokens;
use crate::types::{ProviderId, TaskCategory, UserTier};

pub use quality::{QualityEvaluator, default_evaluator};

/// Quality substituted when an evaluator fails.
const NEUTRAL_QUALITY: f64 = 50.0;
/// Token efficiency when the provider reported no usage.
const NEUTRAL_EFFICIENCY: f64 = 70.0;
/// Share of the gap to the historical mean that is closed.
const HISTORICAL_PULL: f64 = 0.3;
/// Bonus added before thresholding for premium and enterprise tiers.
const PREMIUM_BONUS: f64 = 5.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Quality evaluator failed: {0}")]
    Evaluator(String),

    #[error("Quality evaluator returned a non-finite score: {0}")]
    InvalidScore(f64),
}

/// The scorer's verdict, which drives the orchestrator's next phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accept,
    RetrySelfHosted,
    FallbackDirectApi,
    FallbackGateway,
    ForcePremium,
    /// The attempt produced no response to grade.
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::RetrySelfHosted => "RETRY_SELF_HOSTED",
            Self::FallbackDirectApi => "FALLBACK_DIRECT_API",
            Self::FallbackGateway => "FALLBACK_GATEWAY",
            Self::ForcePremium => "FORCE_PREMIUM",
            Self::Reject => "REJECT",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Quality,
    ResponseTime,
    TokenEfficiency,
    ErrorRate,
}

impl std::fmt::Display for FactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Quality => "quality",
            Self::ResponseTime => "response time",
            Self::TokenEfficiency => "token efficiency",
            Self::ErrorRate => "error rate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreFactor {
    pub name: FactorKind,
    /// In [0, 100].
    pub score: f64,
    /// In [0, 1].
    pub weight: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Weighted aggregate in [0, 100].
    pub score: f64,
    pub decision: Decision,
    pub reasoning: String,
    pub factors: Vec<ScoreFactor>,
    pub recommendations: Vec<String>,
}

impl ScoreResult {
    pub fn factor(&self, kind: FactorKind) -> Option<&ScoreFactor> {
        self.factors.iter().find(|f| f.name == kind)
    }
}

/// Everything the scorer needs to grade one response.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub response_text: &'a str,
    pub category: TaskCategory,
    pub provider: ProviderId,
    pub temperature: f64,
    pub latency_ms: u64,
    pub token_count: Option<u32>,
    pub error_count: Option<u32>,
    /// Recent mean score for this (provider, category) pair.
    pub historical_average: Option<f64>,
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorWeights {
    pub quality: f64,
    pub response_time: f64,
    pub token_efficiency: f64,
    pub error_rate: f64,
}

const fn w(quality: f64, response_time: f64, token_efficiency: f64, error_rate: f64) -> FactorWeights {
    FactorWeights {
        quality,
        response_time,
        token_efficiency,
        error_rate,
    }
}

impl FactorWeights {
    /// Every category has a row; each row sums to 1.0.
    pub fn for_category(category: TaskCategory) -> Self {
        match category {
            TaskCategory::StructuredOutput => w(0.70, 0.10, 0.10, 0.10),
            TaskCategory::CodeGeneration => w(0.70, 0.10, 0.10, 0.10),
            TaskCategory::CreativeWriting => w(0.60, 0.10, 0.20, 0.10),
            TaskCategory::ComplexReasoning => w(0.70, 0.10, 0.10, 0.10),
            TaskCategory::ToolExecution => w(0.60, 0.15, 0.10, 0.15),
            TaskCategory::DataAnalysis => w(0.65, 0.10, 0.15, 0.10),
            TaskCategory::MathReasoning => w(0.75, 0.10, 0.05, 0.10),
            TaskCategory::Conversational => w(0.40, 0.35, 0.15, 0.10),
            TaskCategory::RealtimeInfo => w(0.50, 0.30, 0.10, 0.10),
            TaskCategory::Multimodal => w(0.60, 0.15, 0.15, 0.10),
            TaskCategory::SafetyCritical => w(0.90, 0.05, 0.00, 0.05),
            TaskCategory::CostOptimized => w(0.40, 0.20, 0.30, 0.10),
        }
    }

    pub fn sum(&self) -> f64 {
        self.quality + self.response_time + self.token_efficiency + self.error_rate
    }
}

/// Empirical provider x category quality correction.
fn provider_quality_offset(category: TaskCategory, provider: ProviderId) -> f64 {
    use ProviderId::*;
    use TaskCategory::*;

    match (category, provider) {
        (StructuredOutput, OpenAI) => 3.0,
        (StructuredOutput, Gemini) => 2.0,
        (CodeGeneration, Claude) => 5.0,
        (CodeGeneration, DeepSeek) => 3.0,
        (CodeGeneration, SelfHosted) => -5.0,
        (CreativeWriting, Claude) => 5.0,
        (CreativeWriting, SelfHosted) => -5.0,
        (ComplexReasoning, Claude) => 5.0,
        (ComplexReasoning, OpenAI) => 3.0,
        (ComplexReasoning, SelfHosted) => -5.0,
        (MathReasoning, DeepSeek) => 5.0,
        (MathReasoning, SelfHosted) => -5.0,
        (RealtimeInfo, Grok) => 5.0,
        (Multimodal, Gemini) => 5.0,
        (SafetyCritical, Claude) => 5.0,
        (SafetyCritical, SelfHosted) => -10.0,
        _ => 0.0,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn bounded(v: f64) -> f64 {
    round1(v.clamp(0.0, 100.0))
}

// ---------------------------------------------------------------------------
// ResponseScorer
// ---------------------------------------------------------------------------

/// Stateless grader. Per-category evaluators may be overridden.
#[derive(Clone, Default)]
pub struct ResponseScorer {
    overrides: HashMap<TaskCategory, Arc<dyn QualityEvaluator>>,
}

impl std::fmt::Debug for ResponseScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseScorer")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResponseScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the quality heuristic for one category.
    pub fn with_evaluator(
        mut self,
        category: TaskCategory,
        evaluator: impl QualityEvaluator + 'static,
    ) -> Self {
        self.overrides.insert(category, Arc::new(evaluator));
        self
    }

    fn evaluator(&self, category: TaskCategory) -> Arc<dyn QualityEvaluator> {
        self.overrides
            .get(&category)
            .cloned()
            .unwrap_or_else(|| default_evaluator(category))
    }

    pub fn score(&self, input: &EvaluationInput<'_>, tier: UserTier) -> ScoreResult {
        let weights = FactorWeights::for_category(input.category);

        let factors = vec![
            self.quality_factor(input, weights.quality),
            response_time_factor(input, weights.response_time),
            token_efficiency_factor(input, weights.token_efficiency),
            error_rate_factor(input, weights.error_rate),
        ];

        let aggregate = bounded(factors.iter().map(|f| f.score * f.weight).sum());
        let decision = Self::decide(aggregate, input.category, tier);

        let weakest = factors
            .iter()
            .filter(|f| f.weight > 0.0)
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap_or(&factors[0]);

        let reasoning = format!(
            "Score {aggregate:.1} for {} on {} -> {decision}; weakest factor is {} ({:.1}: {})",
            input.category, input.provider, weakest.name, weakest.score, weakest.reasoning
        );
        let recommendations = recommendations(decision, weakest.name, input.category, aggregate);

        ScoreResult {
            score: aggregate,
            decision,
            reasoning,
            factors,
            recommendations,
        }
    }

    /// Threshold an aggregate score; premium tiers get +5 first.
    pub fn decide(score: f64, category: TaskCategory, tier: UserTier) -> Decision {
        let adjusted = if tier.is_premium() {
            score + PREMIUM_BONUS
        } else {
            score
        };

        if adjusted >= 60.0 {
            Decision::Accept
        } else if adjusted >= 50.0 {
            Decision::RetrySelfHosted
        } else if adjusted >= 40.0 {
            Decision::FallbackDirectApi
        } else if category == TaskCategory::SafetyCritical {
            Decision::ForcePremium
        } else {
            Decision::FallbackGateway
        }
    }

    fn quality_factor(&self, input: &EvaluationInput<'_>, weight: f64) -> ScoreFactor {
        let mut notes = Vec::new();

        let raw = if input.response_text.trim().is_empty() {
            notes.push("empty response".to_string());
            0.0
        } else {
            let evaluated = self
                .evaluator(input.category)
                .evaluate(input.response_text)
                .and_then(|s| {
                    if s.is_finite() {
                        Ok(s)
                    } else {
                        Err(ScoringError::InvalidScore(s))
                    }
                });
            match evaluated {
                Ok(s) => {
                    notes.push(format!("{} heuristic {s:.1}", input.category));
                    s
                }
                Err(e) => {
                    warn!(category = %input.category, provider = %input.provider, "{e}; using neutral quality");
                    notes.push(format!("evaluator failed ({e}), neutral {NEUTRAL_QUALITY}"));
                    NEUTRAL_QUALITY
                }
            }
        };

        let mut score = raw.clamp(0.0, 100.0);

        if let Some(hist) = input.historical_average {
            score += HISTORICAL_PULL * (hist.clamp(0.0, 100.0) - score);
            notes.push(format!("pulled toward historical {hist:.1}"));
        }

        let offset = provider_quality_offset(input.category, input.provider);
        if offset != 0.0 {
            score += offset;
            notes.push(format!("{} offset {offset:+.0}", input.provider));
        }

        ScoreFactor {
            name: FactorKind::Quality,
            score: bounded(score),
            weight,
            reasoning: notes.join(", "),
        }
    }
}

fn response_time_factor(input: &EvaluationInput<'_>, weight: f64) -> ScoreFactor {
    let ms = input.latency_ms;
    let mut score: f64 = match ms {
        0..1_000 => 100.0,
        1_000..3_000 => 90.0,
        3_000..5_000 => 75.0,
        5_000..10_000 => 50.0,
        _ => 25.0,
    };
    let mut reasoning = format!("{ms} ms");
    if input.category == TaskCategory::Conversational && score < 80.0 {
        score += 10.0;
        reasoning.push_str(", conversational allowance +10");
    }

    ScoreFactor {
        name: FactorKind::ResponseTime,
        score: bounded(score),
        weight,
        reasoning,
    }
}

fn token_efficiency_factor(input: &EvaluationInput<'_>, weight: f64) -> ScoreFactor {
    let Some(tokens) = input.token_count else {
        return ScoreFactor {
            name: FactorKind::TokenEfficiency,
            score: NEUTRAL_EFFICIENCY,
            weight,
            reasoning: "no token count reported".into(),
        };
    };

    let estimate = estimate_tokens(input.response_text).max(1) as f64;
    let ratio = tokens as f64 / estimate;
    let mut score = if ratio > 0.0 {
        100.0 * ratio.min(1.0 / ratio)
    } else {
        0.0
    };
    let mut reasoning = format!("{tokens} tokens vs ~{estimate:.0} estimated");

    if input.category == TaskCategory::StructuredOutput && tokens > 1000 {
        score -= 20.0;
        reasoning.push_str(", verbose for structured output");
    }
    if input.category == TaskCategory::CreativeWriting && tokens < 500 {
        score -= 20.0;
        reasoning.push_str(", short for creative writing");
    }

    ScoreFactor {
        name: FactorKind::TokenEfficiency,
        score: bounded(score),
        weight,
        reasoning,
    }
}

fn error_rate_factor(input: &EvaluationInput<'_>, weight: f64) -> ScoreFactor {
    let errors = input.error_count.unwrap_or(0);
    ScoreFactor {
        name: FactorKind::ErrorRate,
        score: bounded(100.0 - 20.0 * errors as f64),
        weight,
        reasoning: format!("{errors} error(s)"),
    }
}

fn recommendations(
    decision: Decision,
    weakest: FactorKind,
    category: TaskCategory,
    score: f64,
) -> Vec<String> {
    let mut out = Vec::with_capacity(4);

    out.push(
        match decision {
            Decision::Accept => format!("Response meets the quality bar for {category}"),
            Decision::RetrySelfHosted => {
                "Retry on the self-hosted model with an adjusted temperature".to_string()
            }
            Decision::FallbackDirectApi => "Escalate to a direct vendor API".to_string(),
            Decision::FallbackGateway => {
                "Route through the gateway to reach a stronger model".to_string()
            }
            Decision::ForcePremium => {
                "Use a premium-tier provider for safety-critical content".to_string()
            }
            Decision::Reject => "No response to evaluate; try another provider".to_string(),
        },
    );

    out.push(match weakest {
        FactorKind::Quality => match category {
            TaskCategory::StructuredOutput => {
                "Request strict JSON output and strip surrounding prose".to_string()
            }
            TaskCategory::CodeGeneration => {
                "Ask for complete, compilable code with error handling".to_string()
            }
            TaskCategory::SafetyCritical => {
                "Require cautious wording and referral to professionals".to_string()
            }
            _ => "Make the prompt more specific about the expected answer".to_string(),
        },
        FactorKind::ResponseTime => "Prefer a faster model or lower max tokens".to_string(),
        FactorKind::TokenEfficiency => "Constrain response length to match the task".to_string(),
        FactorKind::ErrorRate => "Investigate provider errors before retrying".to_string(),
    });

    if score < 40.0 {
        out.push("Consider a higher user tier to unlock stronger providers".to_string());
    }
    if decision == Decision::RetrySelfHosted {
        out.push("Lower the temperature for precision-sensitive tasks".to_string());
    }

    out.truncate(4);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str, category: TaskCategory) -> EvaluationInput<'_> {
        EvaluationInput {
            response_text: text,
            category,
            provider: ProviderId::SelfHosted,
            temperature: 0.2,
            latency_ms: 800,
            token_count: None,
            error_count: None,
            historical_average: None,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        for category in TaskCategory::ALL {
            let w = FactorWeights::for_category(category);
            assert!((w.sum() - 1.0).abs() < 1e-9, "{category}: {}", w.sum());
            assert!((0.4..=0.9).contains(&w.quality), "{category}");
        }
    }

    #[test]
    fn scenario_a_valid_json_is_accepted() {
        let scorer = ResponseScorer::new();
        let result = scorer.score(
            &input(r#"{"name":"John","age":30}"#, TaskCategory::StructuredOutput),
            UserTier::Standard,
        );
        let quality = result.factor(FactorKind::Quality).unwrap();
        assert!(quality.score > 90.0, "{quality:?}");
        assert!(result.score > 60.0);
        assert_eq!(result.decision, Decision::Accept);
    }

    #[test]
    fn scenario_b_invalid_json_falls_back() {
        let scorer = ResponseScorer::new();
        let mut i = input("invalid json {{{", TaskCategory::StructuredOutput);
        i.latency_ms = 5000;
        i.token_count = Some(200);
        let result = scorer.score(&i, UserTier::Standard);

        assert!(result.factor(FactorKind::Quality).unwrap().score < 50.0);
        assert!(result.score < 70.0);
        assert!(matches!(
            result.decision,
            Decision::FallbackDirectApi | Decision::FallbackGateway
        ));
        assert_eq!(result.score, 36.2);
    }

    #[test]
    fn scenario_c_safety_critical_low_score_forces_premium() {
        for _provider in ProviderId::ALL {
            assert_eq!(
                ResponseScorer::decide(35.0, TaskCategory::SafetyCritical, UserTier::Standard),
                Decision::ForcePremium
            );
        }
    }

    #[test]
    fn decision_thresholds() {
        let d = |s, c, t| ResponseScorer::decide(s, c, t);
        let other = TaskCategory::Conversational;
        assert_eq!(d(61.0, other, UserTier::Standard), Decision::Accept);
        assert_eq!(d(55.0, other, UserTier::Standard), Decision::RetrySelfHosted);
        assert_eq!(d(45.0, other, UserTier::Standard), Decision::FallbackDirectApi);
        assert_eq!(d(35.0, other, UserTier::Standard), Decision::FallbackGateway);
        assert_eq!(d(56.0, other, UserTier::Premium), Decision::Accept);
        assert_eq!(d(56.0, other, UserTier::Enterprise), Decision::Accept);
        assert_eq!(d(56.0, other, UserTier::Free), Decision::RetrySelfHosted);
    }

    #[test]
    fn scores_always_within_bounds() {
        let scorer = ResponseScorer::new();
        let texts = ["", "x", "invalid json {{{", &"word ".repeat(3000)];
        for category in TaskCategory::ALL {
            for text in texts {
                for (latency, tokens, errors, hist) in [
                    (0, None, None, None),
                    (60_000, Some(0), Some(50), Some(0.0)),
                    (2_000, Some(100_000), Some(1), Some(100.0)),
                ] {
                    let mut i = input(text, category);
                    i.latency_ms = latency;
                    i.token_count = tokens;
                    i.error_count = errors;
                    i.historical_average = hist;
                    let r = scorer.score(&i, UserTier::Premium);
                    assert!((0.0..=100.0).contains(&r.score));
                    assert_eq!(r.factors.len(), 4);
                    for f in &r.factors {
                        assert!((0.0..=100.0).contains(&f.score), "{f:?}");
                    }
                    assert!((2..=4).contains(&r.recommendations.len()));
                }
            }
        }
    }

    #[test]
    fn response_time_bands() {
        let scorer = ResponseScorer::new();
        let cases = [(999, 100.0), (1000, 90.0), (2999, 90.0), (4999, 75.0), (9999, 50.0), (10_000, 25.0)];
        for (ms, expected) in cases {
            let mut i = input("{}", TaskCategory::StructuredOutput);
            i.latency_ms = ms;
            let r = scorer.score(&i, UserTier::Standard);
            assert_eq!(r.factor(FactorKind::ResponseTime).unwrap().score, expected, "{ms}");
        }

        let mut chat = input("Hello there, how can I help you today?", TaskCategory::Conversational);
        chat.latency_ms = 12_000;
        let r = scorer.score(&chat, UserTier::Standard);
        assert_eq!(r.factor(FactorKind::ResponseTime).unwrap().score, 35.0);
    }

    #[test]
    fn token_efficiency_ratio_and_penalties() {
        let scorer = ResponseScorer::new();
        let text = "a".repeat(400); // ~100 tokens

        let mut exact = input(&text, TaskCategory::DataAnalysis);
        exact.token_count = Some(100);
        assert_eq!(
            scorer.score(&exact, UserTier::Standard).factor(FactorKind::TokenEfficiency).unwrap().score,
            100.0
        );

        let mut double = input(&text, TaskCategory::DataAnalysis);
        double.token_count = Some(200);
        assert_eq!(
            scorer.score(&double, UserTier::Standard).factor(FactorKind::TokenEfficiency).unwrap().score,
            50.0
        );

        let mut creative = input(&text, TaskCategory::CreativeWriting);
        creative.token_count = Some(100);
        assert_eq!(
            scorer.score(&creative, UserTier::Standard).factor(FactorKind::TokenEfficiency).unwrap().score,
            80.0
        );

        let missing = input(&text, TaskCategory::DataAnalysis);
        assert_eq!(
            scorer.score(&missing, UserTier::Standard).factor(FactorKind::TokenEfficiency).unwrap().score,
            70.0
        );
    }

    #[test]
    fn error_rate_floor() {
        let scorer = ResponseScorer::new();
        let mut i = input("{}", TaskCategory::StructuredOutput);
        i.error_count = Some(2);
        assert_eq!(scorer.score(&i, UserTier::Standard).factor(FactorKind::ErrorRate).unwrap().score, 60.0);
        i.error_count = Some(9);
        assert_eq!(scorer.score(&i, UserTier::Standard).factor(FactorKind::ErrorRate).unwrap().score, 0.0);
    }

    #[test]
    fn historical_average_pulls_quality() {
        let scorer = ResponseScorer::new();
        let mut i = input(r#"{"a":1}"#, TaskCategory::StructuredOutput);
        i.historical_average = Some(45.0);
        // 95 + 0.3 * (45 - 95) = 80
        assert_eq!(scorer.score(&i, UserTier::Standard).factor(FactorKind::Quality).unwrap().score, 80.0);
    }

    #[test]
    fn provider_offset_applies() {
        let scorer = ResponseScorer::new();
        let mut i = input(r#"{"a":1}"#, TaskCategory::StructuredOutput);
        i.provider = ProviderId::OpenAI;
        assert_eq!(scorer.score(&i, UserTier::Standard).factor(FactorKind::Quality).unwrap().score, 98.0);
    }

    #[test]
    fn failing_evaluator_yields_neutral_quality() {
        let scorer = ResponseScorer::new().with_evaluator(TaskCategory::StructuredOutput, |_: &str| -> Result<f64, ScoringError> {
            Err(ScoringError::Evaluator("boom".into()))
        });
        let r = scorer.score(&input("{}", TaskCategory::StructuredOutput), UserTier::Standard);
        let q = r.factor(FactorKind::Quality).unwrap();
        assert_eq!(q.score, 50.0);
        assert!(q.reasoning.contains("boom"));
    }

    #[test]
    fn non_finite_evaluator_output_is_neutral() {
        let scorer = ResponseScorer::new()
            .with_evaluator(TaskCategory::Multimodal, |_: &str| -> Result<f64, ScoringError> {
                Ok(f64::NAN)
            });
        let r = scorer.score(&input("a picture", TaskCategory::Multimodal), UserTier::Standard);
        assert_eq!(r.factor(FactorKind::Quality).unwrap().score, 50.0);
    }

    #[test]
    fn empty_response_scores_zero_quality() {
        let scorer = ResponseScorer::new();
        let r = scorer.score(&input("   ", TaskCategory::StructuredOutput), UserTier::Standard);
        assert_eq!(r.factor(FactorKind::Quality).unwrap().score, 0.0);
        assert_ne!(r.decision, Decision::Accept);
    }

    #[test]
    fn reasoning_names_decision_and_weakest_factor() {
        let scorer = ResponseScorer::new();
        let mut i = input(r#"{"a":1}"#, TaskCategory::StructuredOutput);
        i.latency_ms = 20_000;
        let r = scorer.score(&i, UserTier::Standard);
        assert!(r.reasoning.contains("ACCEPT"));
        assert!(r.reasoning.contains("response time"));
        assert!(r.recommendations.iter().any(|s| s.contains("faster")));
    }

    #[test]
    fn decision_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&Decision::FallbackDirectApi).unwrap(),
            "\"FALLBACK_DIRECT_API\""
        );
        assert_eq!(Decision::RetrySelfHosted.to_string(), "RETRY_SELF_HOSTED");
    }
}

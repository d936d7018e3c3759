//! Temperature Advisor
//!
//! Recommends a sampling temperature for a (category, provider) pair,
//! reacting to retries and recent historical scores. Every value returned is
//! clamped to the category's `[min, max]` range.

use serde::Serialize;

use crate::history::HistoricalStats;
use crate::types::{ProviderId, TaskCategory};

// ---------------------------------------------------------------------------
// Per-category table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureConfig {
    pub base: f64,
    pub min: f64,
    pub max: f64,
    pub retry_delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

const fn cfg(base: f64, min: f64, max: f64, retry_delta: f64) -> TemperatureConfig {
    TemperatureConfig {
        base,
        min,
        max,
        retry_delta,
    }
}

fn category_config(category: TaskCategory) -> TemperatureConfig {
    match category {
        TaskCategory::StructuredOutput => cfg(0.20, 0.10, 0.30, -0.05),
        TaskCategory::CodeGeneration => cfg(0.10, 0.05, 0.30, -0.02),
        TaskCategory::CreativeWriting => cfg(0.80, 0.60, 0.90, 0.05),
        TaskCategory::ComplexReasoning => cfg(0.40, 0.30, 0.60, -0.05),
        TaskCategory::ToolExecution => cfg(0.10, 0.05, 0.20, -0.03),
        TaskCategory::DataAnalysis => cfg(0.20, 0.10, 0.40, -0.05),
        TaskCategory::MathReasoning => cfg(0.10, 0.05, 0.20, -0.03),
        TaskCategory::Conversational => cfg(0.70, 0.50, 0.80, 0.03),
        TaskCategory::RealtimeInfo => cfg(0.60, 0.40, 0.70, 0.02),
        TaskCategory::Multimodal => cfg(0.30, 0.20, 0.50, -0.05),
        TaskCategory::SafetyCritical => cfg(0.30, 0.20, 0.40, -0.05),
        TaskCategory::CostOptimized => cfg(0.50, 0.30, 0.70, -0.05),
    }
}

/// Tuned additive correction for a (category, provider) pair.
fn provider_offset(category: TaskCategory, provider: ProviderId) -> Option<f64> {
    use ProviderId::*;
    use TaskCategory::*;

    let offset = match (category, provider) {
        (StructuredOutput, SelfHosted) => -0.02,
        (StructuredOutput, Gemini) => -0.03,
        (CodeGeneration, Claude) => 0.05,
        (CodeGeneration, DeepSeek) => -0.02,
        (CreativeWriting, Claude) => 0.05,
        (CreativeWriting, SelfHosted) => -0.05,
        (ComplexReasoning, OpenAI) => 0.05,
        (ComplexReasoning, DeepSeek) => -0.05,
        (DataAnalysis, Gemini) => -0.05,
        (MathReasoning, DeepSeek) => -0.03,
        (Conversational, Grok) => 0.05,
        (RealtimeInfo, Grok) => 0.05,
        _ => return None,
    };
    Some(offset)
}

/// Static stand-in for a live performance feed.
fn live_performance_offset(provider: ProviderId) -> f64 {
    match provider {
        ProviderId::Grok => -0.02,
        ProviderId::DeepSeek => -0.01,
        _ => 0.0,
    }
}

fn is_well_understood(category: TaskCategory) -> bool {
    matches!(
        category,
        TaskCategory::StructuredOutput
            | TaskCategory::CodeGeneration
            | TaskCategory::ToolExecution
            | TaskCategory::MathReasoning
            | TaskCategory::SafetyCritical
    )
}

fn is_subjective(category: TaskCategory) -> bool {
    matches!(
        category,
        TaskCategory::CreativeWriting | TaskCategory::Conversational
    )
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Request / recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRequest {
    pub category: TaskCategory,
    pub provider: Option<ProviderId>,
    pub user_override: Option<f64>,
    pub is_retry: bool,
    pub historical: Option<HistoricalStats>,
}

impl TemperatureRequest {
    pub fn new(category: TaskCategory) -> Self {
        Self {
            category,
            provider: None,
            user_override: None,
            is_retry: false,
            historical: None,
        }
    }

    pub fn provider(mut self, provider: ProviderId) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn user_override(mut self, value: Option<f64>) -> Self {
        self.user_override = value;
        self
    }

    pub fn retry(mut self, is_retry: bool) -> Self {
        self.is_retry = is_retry;
        self
    }

    pub fn historical(mut self, stats: Option<HistoricalStats>) -> Self {
        self.historical = stats;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureRecommendation {
    pub value: f64,
    pub reasoning: String,
    /// In [0, 1].
    pub confidence: f64,
    /// Two or three nearby values, all within range.
    pub alternatives: Vec<f64>,
}

// ---------------------------------------------------------------------------
// TemperatureAdvisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureAdvisor;

impl TemperatureAdvisor {
    pub fn new() -> Self {
        Self
    }

    pub fn config(&self, category: TaskCategory) -> TemperatureConfig {
        category_config(category)
    }

    pub fn get_range(&self, category: TaskCategory) -> TemperatureRange {
        let c = category_config(category);
        TemperatureRange {
            min: c.min,
            max: c.max,
        }
    }

    pub fn is_within_range(&self, category: TaskCategory, value: f64) -> bool {
        let r = self.get_range(category);
        value >= r.min && value <= r.max
    }

    pub fn recommend(&self, req: &TemperatureRequest) -> TemperatureRecommendation {
        let c = category_config(req.category);

        if let Some(user) = req.user_override {
            let value = if user.is_finite() {
                user.clamp(c.min, c.max)
            } else {
                c.base
            };
            let reasoning = if value == user {
                format!("User-specified temperature {user}")
            } else {
                format!(
                    "User-specified temperature {user} clamped to {value} for {}",
                    req.category
                )
            };
            return TemperatureRecommendation {
                value,
                reasoning,
                confidence: 0.9,
                alternatives: alternatives(value, &c),
            };
        }

        let mut value = c.base;
        let mut reasons = vec![format!("base {:.2} for {}", c.base, req.category)];

        if let Some(stats) = req.historical {
            if stats.average < 60.0 {
                value += 0.10;
                reasons.push(format!(
                    "recent average {:.1} is low, +0.10 for variety",
                    stats.average
                ));
            } else if stats.average > 85.0 {
                value -= 0.05;
                reasons.push(format!(
                    "recent average {:.1} is high, -0.05 for consistency",
                    stats.average
                ));
            }
        }

        let tuned = req
            .provider
            .and_then(|p| provider_offset(req.category, p).map(|o| (p, o)));
        if let Some((provider, offset)) = tuned {
            value += offset;
            reasons.push(format!("{provider} offset {offset:+.2}"));
        }

        if req.is_retry {
            value += c.retry_delta;
            let extra = match req.category {
                TaskCategory::StructuredOutput | TaskCategory::MathReasoning => -0.02,
                TaskCategory::CreativeWriting | TaskCategory::Conversational => 0.05,
                _ => 0.0,
            };
            value += extra;
            reasons.push(format!("retry adjustment {:+.2}", c.retry_delta + extra));
        }

        if let Some(provider) = req.provider {
            let live = live_performance_offset(provider);
            if live != 0.0 {
                value += live;
                reasons.push(format!("{provider} live performance {live:+.2}"));
            }
        }

        let value = round2(value).clamp(c.min, c.max);

        let mut confidence: f64 = 0.8;
        if is_well_understood(req.category) {
            confidence += 0.1;
        }
        if is_subjective(req.category) {
            confidence -= 0.1;
        }
        if tuned.is_some() {
            confidence += 0.05;
        }
        if req.historical.is_some_and(|s| s.samples >= 3) {
            confidence += 0.05;
        }
        if req.is_retry {
            confidence -= 0.1;
        }

        TemperatureRecommendation {
            value,
            reasoning: reasons.join("; "),
            confidence: round2(confidence.clamp(0.5, 0.95)),
            alternatives: alternatives(value, &c),
        }
    }

    /// A retry recommendation pushed one more retry step, for the last-resort
    /// self-hosted attempt.
    pub fn recommend_last_resort(&self, req: &TemperatureRequest) -> TemperatureRecommendation {
        let retry = self.recommend(&req.retry(true));
        if req.user_override.is_some() {
            return retry;
        }

        let c = category_config(req.category);
        let value = round2(retry.value + c.retry_delta).clamp(c.min, c.max);
        TemperatureRecommendation {
            value,
            reasoning: format!("{}; last-resort adjustment {:+.2}", retry.reasoning, c.retry_delta),
            confidence: round2((retry.confidence - 0.1).clamp(0.5, 0.95)),
            alternatives: alternatives(value, &c),
        }
    }
}

fn alternatives(value: f64, c: &TemperatureConfig) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(3);
    for candidate in [value - 0.1, value + 0.1, c.base, c.min, c.max] {
        let v = round2(candidate).clamp(c.min, c.max);
        if (v - value).abs() < 1e-9 || out.iter().any(|o| (o - v).abs() < 1e-9) {
            continue;
        }
        out.push(v);
        if out.len() == 3 {
            break;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn advisor() -> TemperatureAdvisor {
        TemperatureAdvisor::new()
    }

    fn stats(average: f64, samples: u32) -> Option<HistoricalStats> {
        Some(HistoricalStats { average, samples })
    }

    #[test]
    fn table_is_bit_exact() {
        let a = advisor();
        assert_eq!(
            a.config(TaskCategory::StructuredOutput),
            cfg(0.20, 0.10, 0.30, -0.05)
        );
        assert_eq!(a.config(TaskCategory::Conversational), cfg(0.70, 0.50, 0.80, 0.03));
        assert_eq!(a.config(TaskCategory::RealtimeInfo), cfg(0.60, 0.40, 0.70, 0.02));
        for category in TaskCategory::ALL {
            let c = a.config(category);
            assert!(c.min <= c.base && c.base <= c.max, "{category}");
        }
    }

    #[test]
    fn every_recommendation_within_range() {
        let a = advisor();
        let historicals = [None, stats(10.0, 5), stats(95.0, 5), stats(70.0, 1)];
        for category in TaskCategory::ALL {
            for provider in ProviderId::ALL.iter().copied().map(Some).chain([None]) {
                for is_retry in [false, true] {
                    for historical in historicals {
                        let mut req = TemperatureRequest::new(category)
                            .retry(is_retry)
                            .historical(historical);
                        req.provider = provider;

                        for rec in [a.recommend(&req), a.recommend_last_resort(&req)] {
                            assert!(a.is_within_range(category, rec.value), "{category} {rec:?}");
                            assert!((0.5..=0.95).contains(&rec.confidence));
                            assert!((2..=3).contains(&rec.alternatives.len()), "{rec:?}");
                            for alt in &rec.alternatives {
                                assert!(a.is_within_range(category, *alt));
                                assert!((alt - rec.value).abs() > 1e-9);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn user_override_returned_verbatim() {
        let req = TemperatureRequest::new(TaskCategory::CreativeWriting).user_override(Some(0.73));
        let rec = advisor().recommend(&req);
        assert_eq!(rec.value, 0.73);
        assert_eq!(rec.confidence, 0.9);
        assert!(!rec.alternatives.is_empty());
    }

    #[test]
    fn user_override_out_of_range_is_clamped() {
        let req = TemperatureRequest::new(TaskCategory::StructuredOutput).user_override(Some(1.5));
        let rec = advisor().recommend(&req);
        assert_eq!(rec.value, 0.30);
        assert!(rec.reasoning.contains("clamped"));
    }

    #[test]
    fn structured_self_hosted_initial_and_retry() {
        let a = advisor();
        let req = TemperatureRequest::new(TaskCategory::StructuredOutput).provider(ProviderId::SelfHosted);
        let first = a.recommend(&req);
        let retry = a.recommend(&req.retry(true));

        assert_eq!(first.value, 0.18);
        assert_eq!(retry.value, 0.11);
        assert!(retry.value < first.value);
        // 0.8 + 0.1 well-understood + 0.05 tuning entry
        assert_eq!(first.confidence, 0.95);
        assert_eq!(retry.confidence, 0.85);
    }

    #[test]
    fn creative_retry_goes_up() {
        let a = advisor();
        let req = TemperatureRequest::new(TaskCategory::CreativeWriting).provider(ProviderId::Claude);
        let first = a.recommend(&req);
        let retry = a.recommend(&req.retry(true));
        assert_eq!(first.value, 0.85);
        assert_eq!(retry.value, 0.90);
    }

    #[test]
    fn historical_nudges() {
        let a = advisor();
        let low = TemperatureRequest::new(TaskCategory::DataAnalysis).historical(stats(40.0, 2));
        let high = TemperatureRequest::new(TaskCategory::DataAnalysis).historical(stats(90.0, 5));
        assert_eq!(a.recommend(&low).value, 0.30);
        assert_eq!(a.recommend(&high).value, 0.15);
        // ≥3 samples adds confidence.
        assert!(a.recommend(&high).confidence > a.recommend(&low).confidence);
    }

    #[test]
    fn live_offset_applies_without_tuning_entry() {
        let req = TemperatureRequest::new(TaskCategory::CostOptimized).provider(ProviderId::Grok);
        assert_eq!(advisor().recommend(&req).value, 0.48);
    }

    #[test]
    fn last_resort_is_further_adjusted() {
        let a = advisor();
        let req = TemperatureRequest::new(TaskCategory::ComplexReasoning).provider(ProviderId::SelfHosted);
        let retry = a.recommend(&req.retry(true));
        let last = a.recommend_last_resort(&req);
        assert_eq!(retry.value, 0.35);
        assert_eq!(last.value, 0.30);
    }

    #[test]
    fn subjective_categories_have_lower_confidence() {
        let a = advisor();
        let chat = a.recommend(&TemperatureRequest::new(TaskCategory::Conversational));
        let code = a.recommend(&TemperatureRequest::new(TaskCategory::CodeGeneration));
        assert_eq!(chat.confidence, 0.7);
        assert_eq!(code.confidence, 0.9);
    }

    #[test]
    fn get_range_is_idempotent() {
        let a = advisor();
        for category in TaskCategory::ALL {
            assert_eq!(a.get_range(category), a.get_range(category));
        }
        assert!(a.is_within_range(TaskCategory::ToolExecution, 0.05));
        assert!(!a.is_within_range(TaskCategory::ToolExecution, 0.21));
    }
}

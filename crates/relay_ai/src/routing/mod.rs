//! Relay Routing System
//!
//! Task classification, temperature control, response scoring, provider
//! health tracking and the phase orchestrator that ties them together.

pub mod attempt_chain;
pub mod circuit_breaker;
pub mod orchestrator;
pub mod scorer;
pub mod task_classifier;
pub mod temperature;

pub use attempt_chain::{AttemptChain, ChainOutcome, PhaseRunner, StepOutcome};
pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState, FailureReason};
pub use orchestrator::{
    OrchestratorSettings, PathEntry, Phase, RouteRequest, RouterError, RoutingAttempt,
    RoutingOptions, RoutingOrchestrator, RoutingResult,
};
pub use scorer::{
    Decision, EvaluationInput, FactorKind, FactorWeights, QualityEvaluator, ResponseScorer,
    ScoreFactor, ScoreResult, ScoringError,
};
pub use task_classifier::{ClassificationHint, ClassificationResult, TaskClassifier};
pub use temperature::{
    TemperatureAdvisor, TemperatureConfig, TemperatureRange, TemperatureRecommendation,
    TemperatureRequest,
};

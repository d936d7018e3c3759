//! Circuit Breaker
//!
//! Per-provider health gate. A provider that keeps failing is taken out of
//! rotation for a cooldown, then let back in on probation: one success
//! closes the circuit, one failure opens it again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use relay_core::RelayConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::providers::ProviderError;
use crate::types::ProviderId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Why an invocation counted against a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    RateLimit,
    ServerError,
    Timeout,
    QuotaExhausted,
    ModelUnavailable,
    InvalidKey,
}

impl FailureReason {
    /// Classify a free-form error message.
    pub fn from_error(error: &str) -> Self {
        let lower = error.to_lowercase();
        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
        {
            Self::RateLimit
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else if lower.contains("budget")
            || lower.contains("insufficient funds")
            || lower.contains("quota")
        {
            Self::QuotaExhausted
        } else if lower.contains("model")
            && (lower.contains("not found") || lower.contains("unavailable"))
        {
            Self::ModelUnavailable
        } else if lower.contains("invalid") && lower.contains("key") {
            Self::InvalidKey
        } else {
            Self::ServerError
        }
    }

    pub fn from_provider_error(error: &ProviderError) -> Self {
        match error {
            ProviderError::RateLimit => Self::RateLimit,
            ProviderError::Timeout => Self::Timeout,
            ProviderError::InvalidKey => Self::InvalidKey,
            ProviderError::ModelUnavailable(_) => Self::ModelUnavailable,
            other => Self::from_error(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before probing.
    pub cooldown: Duration,
    /// Cooldown applied when the provider signalled a rate limit.
    pub rate_limit_cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            failure_threshold: config.circuit_failure_threshold.max(1),
            cooldown: Duration::from_secs(config.circuit_cooldown_secs),
            rate_limit_cooldown: Duration::from_secs(config.rate_limit_cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ProviderCircuit {
    consecutive_failures: u32,
    /// Set while open: when it opened and for how long.
    open: Option<(Instant, Duration)>,
    last_failure: Option<FailureReason>,
}

impl ProviderCircuit {
    fn state(&self) -> CircuitState {
        match self.open {
            None => CircuitState::Closed,
            Some((since, cooldown)) if since.elapsed() >= cooldown => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }
}

// ---------------------------------------------------------------------------
// CircuitBreaker
// ---------------------------------------------------------------------------

/// Shared across all in-flight requests; every call takes the lock briefly
/// and never awaits while holding it.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    circuits: RwLock<HashMap<ProviderId, ProviderCircuit>>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            circuits: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Whether a call to `provider` may go out now. Half-open circuits admit
    /// traffic; the next recorded outcome decides which way they flip.
    pub fn allow(&self, provider: ProviderId) -> bool {
        let state = self.state(provider);
        if state == CircuitState::HalfOpen {
            debug!(%provider, "Circuit half-open, admitting probe");
        }
        state != CircuitState::Open
    }

    pub fn state(&self, provider: ProviderId) -> CircuitState {
        self.circuits
            .read()
            .get(&provider)
            .map(ProviderCircuit::state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn consecutive_failures(&self, provider: ProviderId) -> u32 {
        self.circuits
            .read()
            .get(&provider)
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn last_failure(&self, provider: ProviderId) -> Option<FailureReason> {
        self.circuits.read().get(&provider).and_then(|c| c.last_failure)
    }

    pub fn record_success(&self, provider: ProviderId) {
        let mut map = self.circuits.write();
        let circuit = map.entry(provider).or_default();
        if circuit.open.is_some() {
            info!(%provider, "Circuit closed after successful probe");
        }
        circuit.consecutive_failures = 0;
        circuit.open = None;
        circuit.last_failure = None;
    }

    pub fn record_failure(&self, provider: ProviderId, reason: FailureReason) {
        let mut map = self.circuits.write();
        let circuit = map.entry(provider).or_default();
        let was = circuit.state();
        circuit.consecutive_failures += 1;
        circuit.last_failure = Some(reason);

        let cooldown = if reason == FailureReason::RateLimit {
            self.config.rate_limit_cooldown
        } else {
            self.config.cooldown
        };

        let trips = match was {
            CircuitState::HalfOpen => true,
            _ => {
                reason == FailureReason::RateLimit
                    || circuit.consecutive_failures >= self.config.failure_threshold
            }
        };

        if trips {
            circuit.open = Some((Instant::now(), cooldown));
            warn!(
                %provider,
                ?reason,
                failures = circuit.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Circuit opened"
            );
        } else {
            debug!(%provider, ?reason, failures = circuit.consecutive_failures, "Provider failure recorded");
        }
    }

    /// Close every circuit and forget all failure counts.
    pub fn reset_all(&self) {
        self.circuits.write().clear();
        info!("All circuits reset");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            cooldown,
            rate_limit_cooldown: Duration::from_secs(60),
        })
    }

    #[test]
    fn unknown_provider_is_closed() {
        let b = CircuitBreaker::default();
        assert_eq!(b.state(ProviderId::Claude), CircuitState::Closed);
        assert!(b.allow(ProviderId::Claude));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let b = breaker(Duration::from_secs(30));
        b.record_failure(ProviderId::OpenAI, FailureReason::ServerError);
        b.record_failure(ProviderId::OpenAI, FailureReason::Timeout);
        assert_eq!(b.state(ProviderId::OpenAI), CircuitState::Closed);
        b.record_failure(ProviderId::OpenAI, FailureReason::ServerError);
        assert_eq!(b.state(ProviderId::OpenAI), CircuitState::Open);
        assert!(!b.allow(ProviderId::OpenAI));
        assert!(b.allow(ProviderId::Gemini));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker(Duration::from_secs(30));
        b.record_failure(ProviderId::Grok, FailureReason::ServerError);
        b.record_failure(ProviderId::Grok, FailureReason::ServerError);
        b.record_success(ProviderId::Grok);
        b.record_failure(ProviderId::Grok, FailureReason::ServerError);
        assert_eq!(b.consecutive_failures(ProviderId::Grok), 1);
        assert_eq!(b.state(ProviderId::Grok), CircuitState::Closed);
    }

    #[test]
    fn half_opens_after_cooldown_then_closes_on_success() {
        let b = breaker(Duration::from_millis(10));
        for _ in 0..3 {
            b.record_failure(ProviderId::DeepSeek, FailureReason::ServerError);
        }
        assert_eq!(b.state(ProviderId::DeepSeek), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(b.state(ProviderId::DeepSeek), CircuitState::HalfOpen);
        assert!(b.allow(ProviderId::DeepSeek));

        b.record_success(ProviderId::DeepSeek);
        assert_eq!(b.state(ProviderId::DeepSeek), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_reopens() {
        let b = breaker(Duration::from_millis(10));
        for _ in 0..3 {
            b.record_failure(ProviderId::Gateway, FailureReason::ServerError);
        }
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(b.state(ProviderId::Gateway), CircuitState::HalfOpen);

        b.record_failure(ProviderId::Gateway, FailureReason::Timeout);
        // Reopened with a fresh 10ms cooldown
        assert_eq!(b.state(ProviderId::Gateway), CircuitState::Open);
    }

    #[test]
    fn rate_limit_opens_immediately_with_longer_cooldown() {
        let b = breaker(Duration::from_millis(1));
        b.record_failure(ProviderId::OpenAI, FailureReason::RateLimit);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(b.state(ProviderId::OpenAI), CircuitState::Open);
        assert_eq!(b.last_failure(ProviderId::OpenAI), Some(FailureReason::RateLimit));
    }

    #[test]
    fn reset_all_closes_everything() {
        let b = breaker(Duration::from_secs(30));
        for _ in 0..3 {
            b.record_failure(ProviderId::Claude, FailureReason::ServerError);
        }
        b.reset_all();
        assert_eq!(b.state(ProviderId::Claude), CircuitState::Closed);
        assert_eq!(b.consecutive_failures(ProviderId::Claude), 0);
    }

    #[test]
    fn classifies_error_messages() {
        assert_eq!(FailureReason::from_error("HTTP 429 Too Many Requests"), FailureReason::RateLimit);
        assert_eq!(FailureReason::from_error("request timed out"), FailureReason::Timeout);
        assert_eq!(FailureReason::from_error("monthly quota exceeded"), FailureReason::QuotaExhausted);
        assert_eq!(FailureReason::from_error("model gpt-9 not found"), FailureReason::ModelUnavailable);
        assert_eq!(FailureReason::from_error("connection reset"), FailureReason::ServerError);
    }

    #[test]
    fn classifies_provider_errors() {
        assert_eq!(
            FailureReason::from_provider_error(&ProviderError::RateLimit),
            FailureReason::RateLimit
        );
        assert_eq!(
            FailureReason::from_provider_error(&ProviderError::Network("dns failure".into())),
            FailureReason::ServerError
        );
    }

    #[test]
    fn config_from_relay_config() {
        let mut config = RelayConfig::default();
        config.circuit_failure_threshold = 5;
        config.circuit_cooldown_secs = 10;
        let b = BreakerConfig::from_config(&config);
        assert_eq!(b.failure_threshold, 5);
        assert_eq!(b.cooldown, Duration::from_secs(10));
        assert_eq!(b.rate_limit_cooldown, Duration::from_secs(60));
    }
}

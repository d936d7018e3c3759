//! Score history.
//!
//! Two narrow seams: [`HistoricalReader`] feeds recent averages into the
//! temperature advisor and scorer, [`ScoreSink`] receives a record of every
//! scored attempt. [`InMemoryScoreHistory`] implements both.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::routing::Decision;
use crate::types::{ProviderId, TaskCategory, UserTier};

/// Records kept before trimming.
const MAX_RECORDS: usize = 1000;
/// Records retained after a trim.
const RETAINED_RECORDS: usize = 500;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Score store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write score record: {0}")]
    Write(String),
}

/// Mean score over a window and how many samples it covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalStats {
    pub average: f64,
    pub samples: u32,
}

/// One scored attempt, handed to a [`ScoreSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: Uuid,
    pub provider: ProviderId,
    pub model: String,
    pub category: TaskCategory,
    pub tier: UserTier,
    pub score: f64,
    pub decision: Decision,
    pub temperature: f64,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl ScoreRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: ProviderId,
        model: impl Into<String>,
        category: TaskCategory,
        tier: UserTier,
        score: f64,
        decision: Decision,
        temperature: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            model: model.into(),
            category,
            tier,
            score,
            decision,
            temperature,
            latency_ms,
            recorded_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read side. Implementations must tolerate concurrent callers.
#[async_trait]
pub trait HistoricalReader: Send + Sync {
    async fn recent_average(
        &self,
        provider: ProviderId,
        category: TaskCategory,
        window_days: u32,
    ) -> Option<HistoricalStats>;
}

/// Write side. Called fire-and-forget; errors are logged by the caller.
#[async_trait]
pub trait ScoreSink: Send + Sync {
    async fn record_score(&self, record: ScoreRecord) -> Result<(), PersistenceError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Bounded in-process history (newest 500 kept once 1000 accumulate).
#[derive(Debug, Default)]
pub struct InMemoryScoreHistory {
    records: RwLock<Vec<ScoreRecord>>,
}

impl InMemoryScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ScoreRecord) {
        let mut records = self.records.write();
        records.push(record);
        if records.len() > MAX_RECORDS {
            let drain_end = records.len() - RETAINED_RECORDS;
            records.drain(..drain_end);
            debug!(kept = records.len(), "score history trimmed");
        }
    }

    pub fn records(&self) -> Vec<ScoreRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    fn stats_since(
        &self,
        provider: ProviderId,
        category: TaskCategory,
        since: DateTime<Utc>,
    ) -> Option<HistoricalStats> {
        let records = self.records.read();
        let (sum, count) = records
            .iter()
            .filter(|r| r.provider == provider && r.category == category && r.recorded_at >= since)
            .fold((0.0, 0u32), |(sum, n), r| (sum + r.score, n + 1));

        (count > 0).then(|| HistoricalStats {
            average: sum / count as f64,
            samples: count,
        })
    }
}

#[async_trait]
impl HistoricalReader for InMemoryScoreHistory {
    async fn recent_average(
        &self,
        provider: ProviderId,
        category: TaskCategory,
        window_days: u32,
    ) -> Option<HistoricalStats> {
        let since = Utc::now() - Duration::days(i64::from(window_days));
        self.stats_since(provider, category, since)
    }
}

#[async_trait]
impl ScoreSink for InMemoryScoreHistory {
    async fn record_score(&self, record: ScoreRecord) -> Result<(), PersistenceError> {
        self.push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(provider: ProviderId, category: TaskCategory, score: f64) -> ScoreRecord {
        ScoreRecord::new(
            provider,
            "model",
            category,
            UserTier::Standard,
            score,
            Decision::Accept,
            0.2,
            100,
        )
    }

    #[tokio::test]
    async fn average_filters_by_provider_and_category() {
        let history = InMemoryScoreHistory::new();
        history.push(record(ProviderId::SelfHosted, TaskCategory::StructuredOutput, 80.0));
        history.push(record(ProviderId::SelfHosted, TaskCategory::StructuredOutput, 60.0));
        history.push(record(ProviderId::OpenAI, TaskCategory::StructuredOutput, 10.0));
        history.push(record(ProviderId::SelfHosted, TaskCategory::Conversational, 10.0));

        let stats = history
            .recent_average(ProviderId::SelfHosted, TaskCategory::StructuredOutput, 7)
            .await
            .unwrap();
        assert_eq!(stats.samples, 2);
        assert!((stats.average - 70.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_samples_is_none() {
        let history = InMemoryScoreHistory::new();
        assert!(history
            .recent_average(ProviderId::Grok, TaskCategory::RealtimeInfo, 7)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn old_records_fall_outside_window() {
        let history = InMemoryScoreHistory::new();
        let mut old = record(ProviderId::Gemini, TaskCategory::DataAnalysis, 20.0);
        old.recorded_at = Utc::now() - Duration::days(30);
        history.push(old);
        history.push(record(ProviderId::Gemini, TaskCategory::DataAnalysis, 90.0));

        let stats = history
            .recent_average(ProviderId::Gemini, TaskCategory::DataAnalysis, 7)
            .await
            .unwrap();
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.average, 90.0);
    }

    #[test]
    fn history_trims_to_newest() {
        let history = InMemoryScoreHistory::new();
        for i in 0..=MAX_RECORDS {
            history.push(record(ProviderId::SelfHosted, TaskCategory::CostOptimized, i as f64 % 100.0));
        }
        assert_eq!(history.len(), RETAINED_RECORDS);
        let records = history.records();
        assert_eq!(records.last().unwrap().score, (MAX_RECORDS % 100) as f64);
    }

    #[tokio::test]
    async fn sink_records_are_readable_concurrently() {
        let history = Arc::new(InMemoryScoreHistory::new());
        let mut handles = Vec::new();
        for i in 0..20 {
            let h = Arc::clone(&history);
            handles.push(tokio::spawn(async move {
                h.record_score(record(ProviderId::Claude, TaskCategory::CodeGeneration, i as f64))
                    .await
                    .unwrap();
                h.recent_average(ProviderId::Claude, TaskCategory::CodeGeneration, 7)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(history.len(), 20);
    }

    #[test]
    fn record_ids_are_unique() {
        let a = record(ProviderId::SelfHosted, TaskCategory::Multimodal, 50.0);
        let b = record(ProviderId::SelfHosted, TaskCategory::Multimodal, 50.0);
        assert_ne!(a.id, b.id);
    }
}

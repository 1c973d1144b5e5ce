//! In-memory feedback store
//!
//! Bounded ring of records plus a satisfaction overlay keyed by request id.
//! Used by tests and by deployments that do not configure a database path.

use super::{FailureKind, FeedbackRecord, FeedbackStore, FeedbackWindow};
use crate::agents::AgentKind;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 10_000;

/// In-memory append-only feedback store
pub struct MemoryFeedbackStore {
    records: RwLock<VecDeque<FeedbackRecord>>,
    satisfaction: RwLock<HashMap<Uuid, bool>>,
    capacity: usize,
}

impl MemoryFeedbackStore {
    /// Create a store with the default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store bounded to `capacity` records
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            satisfaction: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Number of records currently held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryFeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn record(&self, record: FeedbackRecord) {
        let mut records = self.records.write().await;
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    async fn record_satisfaction(&self, request_id: Uuid, satisfactory: bool) {
        // Latest mark per request wins; earlier records are never rewritten.
        self.satisfaction.write().await.insert(request_id, satisfactory);
    }

    async fn success_rate(&self, agent: AgentKind, window: &FeedbackWindow) -> Option<f64> {
        let cutoff = window.cutoff();
        let satisfaction = self.satisfaction.read().await;
        let records = self.records.read().await;

        let outcomes: Vec<bool> = records
            .iter()
            .rev()
            .filter(|r| r.agent == agent && r.timestamp >= cutoff)
            .take(window.max_records)
            .map(|r| r.success && satisfaction.get(&r.request_id) != Some(&false))
            .collect();

        if outcomes.is_empty() {
            return None;
        }
        let successes = outcomes.iter().filter(|s| **s).count();
        Some(successes as f64 / outcomes.len() as f64)
    }

    async fn recent_errors(&self, agent: AgentKind, window: &FeedbackWindow) -> Vec<FailureKind> {
        let cutoff = window.cutoff();
        self.records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.agent == agent && r.timestamp >= cutoff)
            .take(window.max_records)
            .filter_map(|r| r.error)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(agent: AgentKind) -> FeedbackRecord {
        FeedbackRecord::success(Uuid::new_v4(), agent, 120, 0.9, vec!["sql_query".into()])
    }

    #[tokio::test]
    async fn test_success_rate_no_history() {
        let store = MemoryFeedbackStore::new();
        let rate = store
            .success_rate(AgentKind::Sql, &FeedbackWindow::default())
            .await;
        assert_eq!(rate, None);
    }

    #[tokio::test]
    async fn test_success_rate_counts_failures() {
        let store = MemoryFeedbackStore::new();
        store.record(success(AgentKind::Sql)).await;
        store.record(success(AgentKind::Sql)).await;
        store
            .record(FeedbackRecord::failure(
                Uuid::new_v4(),
                AgentKind::Sql,
                80,
                FailureKind::Timeout,
            ))
            .await;
        // Different agent does not pollute the window.
        store.record(success(AgentKind::Chart)).await;

        let rate = store
            .success_rate(AgentKind::Sql, &FeedbackWindow::default())
            .await
            .unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unsatisfactory_mark_lowers_rate() {
        let store = MemoryFeedbackStore::new();
        let record = success(AgentKind::Insights);
        let request_id = record.request_id;
        store.record(record).await;
        store.record(success(AgentKind::Insights)).await;

        let before = store
            .success_rate(AgentKind::Insights, &FeedbackWindow::default())
            .await
            .unwrap();
        assert!((before - 1.0).abs() < 1e-9);

        store.record_satisfaction(request_id, false).await;

        let after = store
            .success_rate(AgentKind::Insights, &FeedbackWindow::default())
            .await
            .unwrap();
        assert!(after < before);
        assert!((after - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_window_record_cap() {
        let store = MemoryFeedbackStore::new();
        store
            .record(FeedbackRecord::failure(
                Uuid::new_v4(),
                AgentKind::Sql,
                80,
                FailureKind::Network,
            ))
            .await;
        for _ in 0..5 {
            store.record(success(AgentKind::Sql)).await;
        }

        // Window of 5 most-recent records excludes the old failure.
        let window = FeedbackWindow {
            max_records: 5,
            ..Default::default()
        };
        let rate = store.success_rate(AgentKind::Sql, &window).await.unwrap();
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recent_errors_most_recent_first() {
        let store = MemoryFeedbackStore::new();
        store
            .record(FeedbackRecord::failure(
                Uuid::new_v4(),
                AgentKind::Chart,
                90,
                FailureKind::Network,
            ))
            .await;
        store
            .record(FeedbackRecord::failure(
                Uuid::new_v4(),
                AgentKind::Chart,
                95,
                FailureKind::InvalidJson,
            ))
            .await;

        let errors = store
            .recent_errors(AgentKind::Chart, &FeedbackWindow::default())
            .await;
        assert_eq!(errors, vec![FailureKind::InvalidJson, FailureKind::Network]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = MemoryFeedbackStore::with_capacity(2);
        store.record(success(AgentKind::Sql)).await;
        store.record(success(AgentKind::Sql)).await;
        store.record(success(AgentKind::Sql)).await;
        assert_eq!(store.len().await, 2);
    }
}

//! Feedback-driven prompt tuning
//!
//! Behind a feature flag. When enabled, the tuning service inspects recent
//! failure kinds per agent and, when one kind dominates, emits a heuristic
//! prompt patch the agent executor appends to its system prompt. Patches are
//! advisory text only; disabling tuning makes agents fall back to their base
//! prompts immediately.

use crate::agents::{self, AgentKind};
use crate::feedback::{FailureKind, FeedbackStore, FeedbackWindow};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// One prompt patch for one agent
#[derive(Debug, Clone, Serialize)]
pub struct PromptAdjustment {
    /// Agent the patch applies to
    pub agent: AgentKind,
    /// Short description of what triggered the patch
    pub trigger: String,
    /// Text appended to the agent's system prompt
    pub patch: String,
    /// When the patch was produced
    pub created_at: DateTime<Utc>,
}

/// Prompt tuning seam consumed by agent executors and the admin surface
#[async_trait::async_trait]
pub trait PromptTuning: Send + Sync {
    /// Inspect recent feedback and propose new adjustments
    async fn analyze(&self) -> Vec<PromptAdjustment>;

    /// Activate an adjustment
    async fn apply(&self, adjustment: PromptAdjustment);

    /// Most recent active adjustment for an agent
    fn latest(&self, agent: AgentKind) -> Option<PromptAdjustment>;

    /// Turn tuning on
    fn enable(&self);

    /// Turn tuning off
    fn disable(&self);

    /// Whether tuning is currently active
    fn is_enabled(&self) -> bool;
}

/// Tuning disabled entirely, the default
pub struct NoopTuning;

#[async_trait::async_trait]
impl PromptTuning for NoopTuning {
    async fn analyze(&self) -> Vec<PromptAdjustment> {
        Vec::new()
    }

    async fn apply(&self, _adjustment: PromptAdjustment) {}

    fn latest(&self, _agent: AgentKind) -> Option<PromptAdjustment> {
        None
    }

    fn enable(&self) {}

    fn disable(&self) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Minimum windowed failures before a spike is considered meaningful
const DEFAULT_MIN_SAMPLES: usize = 5;
/// Fraction of failures one kind must reach to count as a spike
const DEFAULT_SPIKE_RATIO: f64 = 0.5;

/// Heuristic tuning driven by failure-kind spikes in the feedback window
pub struct HeuristicTuning {
    feedback: Arc<dyn FeedbackStore>,
    window: FeedbackWindow,
    min_samples: usize,
    spike_ratio: f64,
    adjustments: DashMap<AgentKind, Vec<PromptAdjustment>>,
    enabled: AtomicBool,
}

impl HeuristicTuning {
    /// Create a tuning service over a feedback store. Starts disabled.
    #[must_use]
    pub fn new(feedback: Arc<dyn FeedbackStore>, window: FeedbackWindow) -> Self {
        Self {
            feedback,
            window,
            min_samples: DEFAULT_MIN_SAMPLES,
            spike_ratio: DEFAULT_SPIKE_RATIO,
            adjustments: DashMap::new(),
            enabled: AtomicBool::new(false),
        }
    }

    /// Set the minimum sample count for spike detection
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples.max(1);
        self
    }

    /// Set the spike ratio threshold
    #[must_use]
    pub fn with_spike_ratio(mut self, ratio: f64) -> Self {
        self.spike_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    fn patch_for(&self, agent: AgentKind, kind: FailureKind) -> Option<(String, String)> {
        let required = agents::descriptor(agent)
            .required_fields
            .join("`, `");

        match kind {
            FailureKind::InvalidJson => Some((
                format!("{kind} spike"),
                "Respond with a single JSON object and nothing else: no prose, \
                 no markdown fences, no commentary before or after the JSON."
                    .to_string(),
            )),
            FailureKind::MissingFields => Some((
                format!("{kind} spike"),
                format!(
                    "Your response must always include every one of these keys, \
                     each with a non-null value: `{required}`."
                ),
            )),
            FailureKind::Timeout => Some((
                format!("{kind} spike"),
                "Keep the response short. Do not enumerate alternatives or add \
                 explanations beyond the requested structure."
                    .to_string(),
            )),
            FailureKind::Validation => Some((
                format!("{kind} spike"),
                format!(
                    "Follow the requested output format exactly. The expected \
                     keys are: `{required}`."
                ),
            )),
            // Infrastructure failures are not prompt problems.
            FailureKind::RateLimited
            | FailureKind::Network
            | FailureKind::Upstream
            | FailureKind::CircuitOpen => None,
        }
    }

    fn already_applied(&self, agent: AgentKind, trigger: &str) -> bool {
        self.adjustments
            .get(&agent)
            .and_then(|list| list.last().map(|a| a.trigger == trigger))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl PromptTuning for HeuristicTuning {
    async fn analyze(&self) -> Vec<PromptAdjustment> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut proposals = Vec::new();
        for agent in AgentKind::all() {
            let errors = self.feedback.recent_errors(agent, &self.window).await;
            if errors.len() < self.min_samples {
                continue;
            }

            let mut counts: std::collections::HashMap<FailureKind, usize> =
                std::collections::HashMap::new();
            for kind in &errors {
                *counts.entry(*kind).or_default() += 1;
            }

            let Some((kind, count)) = counts.into_iter().max_by_key(|(_, c)| *c) else {
                continue;
            };
            if (count as f64) / (errors.len() as f64) < self.spike_ratio {
                continue;
            }

            if let Some((trigger, patch)) = self.patch_for(agent, kind) {
                if self.already_applied(agent, &trigger) {
                    continue;
                }
                proposals.push(PromptAdjustment {
                    agent,
                    trigger,
                    patch,
                    created_at: Utc::now(),
                });
            }
        }
        proposals
    }

    async fn apply(&self, adjustment: PromptAdjustment) {
        info!(
            agent = %adjustment.agent,
            trigger = %adjustment.trigger,
            "prompt adjustment applied"
        );
        self.adjustments
            .entry(adjustment.agent)
            .or_default()
            .push(adjustment);
    }

    fn latest(&self, agent: AgentKind) -> Option<PromptAdjustment> {
        self.adjustments
            .get(&agent)
            .and_then(|list| list.last().cloned())
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{FeedbackRecord, MemoryFeedbackStore};
    use uuid::Uuid;

    async fn store_with_failures(agent: AgentKind, kind: FailureKind, n: usize) -> Arc<MemoryFeedbackStore> {
        let store = Arc::new(MemoryFeedbackStore::new());
        for _ in 0..n {
            store
                .record(FeedbackRecord::failure(Uuid::new_v4(), agent, 100, kind))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_disabled_analyze_is_empty() {
        let store = store_with_failures(AgentKind::Sql, FailureKind::InvalidJson, 10).await;
        let tuning = HeuristicTuning::new(store, FeedbackWindow::default());
        assert!(!tuning.is_enabled());
        assert!(tuning.analyze().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_spike_produces_patch() {
        let store = store_with_failures(AgentKind::Chart, FailureKind::InvalidJson, 8).await;
        let tuning = HeuristicTuning::new(store, FeedbackWindow::default());
        tuning.enable();

        let proposals = tuning.analyze().await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].agent, AgentKind::Chart);
        assert!(proposals[0].patch.contains("JSON"));
    }

    #[tokio::test]
    async fn test_below_min_samples_is_ignored() {
        let store = store_with_failures(AgentKind::Sql, FailureKind::Timeout, 2).await;
        let tuning = HeuristicTuning::new(store, FeedbackWindow::default());
        tuning.enable();
        assert!(tuning.analyze().await.is_empty());
    }

    #[tokio::test]
    async fn test_infrastructure_failures_not_patched() {
        let store = store_with_failures(AgentKind::Insights, FailureKind::Network, 10).await;
        let tuning = HeuristicTuning::new(store, FeedbackWindow::default());
        tuning.enable();
        assert!(tuning.analyze().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_and_latest() {
        let store = Arc::new(MemoryFeedbackStore::new());
        let tuning = HeuristicTuning::new(store, FeedbackWindow::default());
        tuning.enable();

        assert!(tuning.latest(AgentKind::Unified).is_none());
        tuning
            .apply(PromptAdjustment {
                agent: AgentKind::Unified,
                trigger: "missing_fields spike".into(),
                patch: "Always include every key.".into(),
                created_at: Utc::now(),
            })
            .await;

        let latest = tuning.latest(AgentKind::Unified).unwrap();
        assert_eq!(latest.trigger, "missing_fields spike");
    }

    #[tokio::test]
    async fn test_same_trigger_not_reproposed() {
        let store = store_with_failures(AgentKind::Sql, FailureKind::MissingFields, 8).await;
        let tuning = HeuristicTuning::new(store, FeedbackWindow::default());
        tuning.enable();

        let first = tuning.analyze().await;
        assert_eq!(first.len(), 1);
        tuning.apply(first.into_iter().next().unwrap()).await;

        assert!(tuning.analyze().await.is_empty());
    }
}

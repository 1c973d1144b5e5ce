//! Result combiner and confidence calibration
//!
//! Merges per-agent outputs into one response and scores it as a weighted
//! blend of completeness, agent-reported confidence, and the historical
//! success rate of the contributing agents. Agents without history get a
//! cold-start prior rather than zero, so new deployments are not punished
//! for having no track record.

use crate::agents::{fields, AgentKind, AgentResult};
use crate::error::{Error, Result};
use crate::feedback::{FeedbackStore, FeedbackWindow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Historical success rate assumed for an agent with no recorded history
pub const COLD_START_PRIOR: f64 = 0.8;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weights of the three confidence components. Must be non-negative and sum
/// to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    /// Weight of the required-field completeness ratio
    pub completeness: f64,
    /// Weight of the mean agent-reported confidence
    pub agent_confidence: f64,
    /// Weight of the mean historical success rate
    pub historical: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            completeness: 0.4,
            agent_confidence: 0.3,
            historical: 0.3,
        }
    }
}

impl ConfidenceWeights {
    /// Validate the invariants the blend relies on
    pub fn validate(&self) -> Result<()> {
        if self.completeness < 0.0 || self.agent_confidence < 0.0 || self.historical < 0.0 {
            return Err(Error::Validation(
                "confidence weights must be non-negative".to_string(),
            ));
        }
        let sum = self.completeness + self.agent_confidence + self.historical;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Validation(format!(
                "confidence weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

/// How the chart and insight artifacts were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMethod {
    /// One unified agent call produced chart, insights, and summary
    Unified,
    /// Separate chart and insight agents were used
    Separate,
}

/// Component scores behind the overall confidence
#[derive(Debug, Clone, Serialize)]
pub struct QualityBreakdown {
    /// Fraction of required fields present
    pub completeness: f64,
    /// Mean agent-reported confidence of contributing results
    pub agent_confidence: f64,
    /// Mean windowed historical success rate of contributing agents
    pub historical_success: f64,
    /// Required fields no agent produced
    pub missing_fields: Vec<String>,
}

/// The merged orchestration response
#[derive(Debug, Clone, Serialize)]
pub struct CombinedResult {
    /// Request this result answers
    pub request_id: Uuid,
    /// Generated SQL query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    /// Chart configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_config: Option<Value>,
    /// Narrative insights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Value>,
    /// Executive summary, produced by the unified agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executive_summary: Option<String>,
    /// How chart and insights were produced, when either was required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_method: Option<GenerationMethod>,
    /// Calibrated overall confidence in [0, 1]
    pub overall_confidence: f64,
    /// Component scores
    pub quality: QualityBreakdown,
}

/// Merges agent results and calibrates confidence against history
pub struct ResultCombiner {
    weights: ConfidenceWeights,
    window: FeedbackWindow,
    feedback: Arc<dyn FeedbackStore>,
}

impl ResultCombiner {
    /// Create a combiner. Fails when the weights are invalid.
    pub fn new(
        weights: ConfidenceWeights,
        window: FeedbackWindow,
        feedback: Arc<dyn FeedbackStore>,
    ) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            window,
            feedback,
        })
    }

    /// Merge agent results into one response.
    ///
    /// Partial results contribute the fields they did produce; successful
    /// results overwrite on conflict. `required_fields` drives completeness
    /// and the missing-field report.
    pub async fn combine(
        &self,
        request_id: Uuid,
        results: &[AgentResult],
        required_fields: &[&str],
    ) -> CombinedResult {
        let mut merged: Map<String, Value> = Map::new();
        for result in results.iter().filter(|r| !r.success) {
            merge_fields(&mut merged, &result.fields);
        }
        for result in results.iter().filter(|r| r.success) {
            merge_fields(&mut merged, &result.fields);
        }

        let missing_fields: Vec<String> = required_fields
            .iter()
            .filter(|f| !merged.get(**f).is_some_and(|v| !v.is_null()))
            .map(|f| (*f).to_string())
            .collect();

        let completeness = if required_fields.is_empty() {
            1.0
        } else {
            (required_fields.len() - missing_fields.len()) as f64 / required_fields.len() as f64
        };

        // Only results that actually contributed fields inform the other
        // two components.
        let contributing: Vec<&AgentResult> =
            results.iter().filter(|r| !r.fields.is_empty()).collect();

        let agent_confidence = if contributing.is_empty() {
            0.0
        } else {
            contributing.iter().map(|r| r.confidence_raw).sum::<f64>()
                / contributing.len() as f64
        };

        let historical_success = self
            .historical_rate(contributing.iter().map(|r| r.agent))
            .await;

        let overall = (self.weights.completeness * completeness
            + self.weights.agent_confidence * agent_confidence
            + self.weights.historical * historical_success)
            .clamp(0.0, 1.0);

        let generation_method = generation_method(results, required_fields);

        debug!(
            %request_id,
            completeness,
            agent_confidence,
            historical_success,
            overall,
            ?generation_method,
            "results combined"
        );

        CombinedResult {
            request_id,
            sql_query: merged
                .get(fields::SQL_QUERY)
                .and_then(Value::as_str)
                .map(String::from),
            chart_config: merged.get(fields::CHART_CONFIG).cloned(),
            insights: merged.get(fields::INSIGHTS).cloned(),
            executive_summary: merged
                .get(fields::EXECUTIVE_SUMMARY)
                .and_then(Value::as_str)
                .map(String::from),
            generation_method,
            overall_confidence: overall,
            quality: QualityBreakdown {
                completeness,
                agent_confidence,
                historical_success,
                missing_fields,
            },
        }
    }

    /// Mean windowed success rate of the given agents, with the cold-start
    /// prior standing in for agents that have no history yet.
    async fn historical_rate(&self, agents: impl Iterator<Item = AgentKind>) -> f64 {
        let distinct: BTreeSet<AgentKind> =
            agents.collect::<Vec<_>>().into_iter().collect();
        if distinct.is_empty() {
            return COLD_START_PRIOR;
        }

        let mut sum = 0.0;
        for agent in &distinct {
            sum += self
                .feedback
                .success_rate(*agent, &self.window)
                .await
                .unwrap_or(COLD_START_PRIOR);
        }
        sum / distinct.len() as f64
    }
}

fn merge_fields(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !value.is_null() {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Unified when a fully successful unified result exists; separate when the
/// artifacts came from individual agents; absent when neither chart nor
/// insights were required.
fn generation_method(
    results: &[AgentResult],
    required_fields: &[&str],
) -> Option<GenerationMethod> {
    let chart_or_insights = required_fields.contains(&fields::CHART_CONFIG)
        || required_fields.contains(&fields::INSIGHTS);
    if !chart_or_insights {
        return None;
    }

    let unified_success = results
        .iter()
        .any(|r| r.agent == AgentKind::Unified && r.success);

    Some(if unified_success {
        GenerationMethod::Unified
    } else {
        GenerationMethod::Separate
    })
}

//! Agent abstraction and the LLM-backed agent executor
//!
//! Four agents exist: SQL, chart, insights, and a unified agent that produces
//! chart, insights, and an executive summary in a single LLM call. The
//! orchestrator prefers the unified agent whenever both chart and insights are
//! required, so the registry carries the fields each agent must produce.

mod executor;
pub mod prompts;

pub use executor::LlmAgent;

use crate::error::Result;
use crate::feedback::FailureKind;
use crate::request::{Capability, UserContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Output field names agents produce
pub mod fields {
    /// Generated SQL query text
    pub const SQL_QUERY: &str = "sql_query";
    /// Chart configuration object
    pub const CHART_CONFIG: &str = "chart_config";
    /// Narrative insight list
    pub const INSIGHTS: &str = "insights";
    /// One-paragraph executive summary (unified agent only)
    pub const EXECUTIVE_SUMMARY: &str = "executive_summary";
}

/// The agents known to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// SQL generation agent
    Sql,
    /// Chart configuration agent
    Chart,
    /// Narrative insight agent
    Insights,
    /// Combined chart + insights + summary agent
    Unified,
}

impl AgentKind {
    /// Stable lowercase name used in logs, storage, and API payloads
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Sql => "sql",
            AgentKind::Chart => "chart",
            AgentKind::Insights => "insights",
            AgentKind::Unified => "unified",
        }
    }

    /// All known agent kinds
    #[must_use]
    pub fn all() -> [AgentKind; 4] {
        [
            AgentKind::Sql,
            AgentKind::Chart,
            AgentKind::Insights,
            AgentKind::Unified,
        ]
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static description of an agent: what it covers and what it must produce
#[derive(Debug, Clone, Copy)]
pub struct AgentDescriptor {
    /// Agent identity
    pub kind: AgentKind,
    /// Capabilities this agent satisfies
    pub capabilities: &'static [Capability],
    /// Output fields a successful run must contain
    pub required_fields: &'static [&'static str],
    /// Scheduling priority, lower runs earlier in sequential plans
    pub priority: u8,
}

static REGISTRY: [AgentDescriptor; 4] = [
    AgentDescriptor {
        kind: AgentKind::Sql,
        capabilities: &[Capability::Sql],
        required_fields: &[fields::SQL_QUERY],
        priority: 0,
    },
    AgentDescriptor {
        kind: AgentKind::Unified,
        capabilities: &[Capability::Chart, Capability::Insights],
        required_fields: &[
            fields::CHART_CONFIG,
            fields::INSIGHTS,
            fields::EXECUTIVE_SUMMARY,
        ],
        priority: 1,
    },
    AgentDescriptor {
        kind: AgentKind::Chart,
        capabilities: &[Capability::Chart],
        required_fields: &[fields::CHART_CONFIG],
        priority: 2,
    },
    AgentDescriptor {
        kind: AgentKind::Insights,
        capabilities: &[Capability::Insights],
        required_fields: &[fields::INSIGHTS],
        priority: 3,
    },
];

/// All registered agent descriptors
#[must_use]
pub fn registry() -> &'static [AgentDescriptor] {
    &REGISTRY
}

/// Descriptor for a specific agent kind
#[must_use]
pub fn descriptor(kind: AgentKind) -> &'static AgentDescriptor {
    REGISTRY
        .iter()
        .find(|d| d.kind == kind)
        .unwrap_or(&REGISTRY[0])
}

/// Input to a single agent invocation
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Orchestration request id
    pub request_id: Uuid,
    /// Natural-language query
    pub query: String,
    /// Caller context
    pub user_context: UserContext,
    /// Fields produced by earlier plan steps (e.g. `sql_query`), available
    /// as grounding context for downstream agents
    pub context: Map<String, Value>,
}

impl AgentRequest {
    /// Build a request with empty step context
    #[must_use]
    pub fn new(request_id: Uuid, query: impl Into<String>, user_context: UserContext) -> Self {
        Self {
            request_id,
            query: query.into(),
            user_context,
            context: Map::new(),
        }
    }
}

/// Outcome of one agent invocation
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    /// Agent that produced the result
    pub agent: AgentKind,
    /// Whether a usable output was produced
    pub success: bool,
    /// Output fields keyed by field name
    pub fields: Map<String, Value>,
    /// Agent-reported raw confidence in [0, 1]
    pub confidence_raw: f64,
    /// Wall-clock latency of the invocation
    pub latency_ms: u64,
    /// Failure classification when `success` is false
    pub error: Option<FailureKind>,
}

impl AgentResult {
    /// Result for a failed invocation
    #[must_use]
    pub fn failure(agent: AgentKind, latency_ms: u64, kind: FailureKind) -> Self {
        Self {
            agent,
            success: false,
            fields: Map::new(),
            confidence_raw: 0.0,
            latency_ms,
            error: Some(kind),
        }
    }

    /// Look up an output field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the result carries a non-null field
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| !v.is_null())
    }

    /// Whether the result carries every field in `names`
    #[must_use]
    pub fn has_all_fields(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has_field(n))
    }
}

/// An invocable agent
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    /// Static description of this agent
    fn descriptor(&self) -> &'static AgentDescriptor;

    /// Execute one invocation
    async fn execute(&self, request: &AgentRequest) -> Result<AgentResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_covers_all_kinds() {
        for kind in AgentKind::all() {
            assert_eq!(descriptor(kind).kind, kind);
        }
    }

    #[test]
    fn test_unified_supersedes_chart_and_insights() {
        let unified = descriptor(AgentKind::Unified);
        assert!(unified.capabilities.contains(&Capability::Chart));
        assert!(unified.capabilities.contains(&Capability::Insights));
        assert!(unified.required_fields.contains(&fields::EXECUTIVE_SUMMARY));
    }

    #[test]
    fn test_has_all_fields_treats_null_as_missing() {
        let mut fields_map = Map::new();
        fields_map.insert(fields::SQL_QUERY.to_string(), json!("SELECT 1"));
        fields_map.insert(fields::CHART_CONFIG.to_string(), Value::Null);

        let result = AgentResult {
            agent: AgentKind::Unified,
            success: true,
            fields: fields_map,
            confidence_raw: 0.9,
            latency_ms: 10,
            error: None,
        };

        assert!(result.has_field(fields::SQL_QUERY));
        assert!(!result.has_field(fields::CHART_CONFIG));
        assert!(!result.has_all_fields(&[fields::SQL_QUERY, fields::CHART_CONFIG]));
    }
}

//! Context analyzer and router
//!
//! Turns a validated query into an execution plan: which agents to run, in
//! what arrangement, and how confident the routing heuristics are. Routing is
//! fully deterministic; the confidence score is a coverage ratio over the
//! signals the analyzer could resolve, not a model output.

use crate::agents::{self, AgentKind};
use crate::error::{Error, Result};
use crate::request::{Capability, QueryRequest};
use serde::Serialize;
use tracing::debug;

/// How plan steps are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Steps run one after another, each seeing prior outputs
    Sequential,
    /// Independent steps run concurrently after their shared dependency
    Parallel,
    /// Unified agent first, separate agents held as fallback
    Collaborative,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Collaborative => write!(f, "collaborative"),
        }
    }
}

/// Routing output consumed by the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    /// Step arrangement
    pub strategy: Strategy,
    /// Agents in plan order. For collaborative plans the unified agent comes
    /// first and the separate agents after it are the fallback path.
    pub steps: Vec<AgentKind>,
    /// Coverage ratio of resolved routing signals, in [0, 1]
    pub routing_confidence: f64,
    /// Heuristic query complexity, 0 (trivial) to 10
    pub complexity: u8,
}

/// Markers suggesting the caller described an explicit multi-step flow
const MULTI_STEP_MARKERS: &[&str] = &[
    "then ",
    "after that",
    "first ",
    "next ",
    "followed by",
    "step ",
];

/// Markers of aggregation-heavy analytical work
const AGGREGATION_MARKERS: &[&str] = &[
    "sum", "total", "average", "avg", "count", "group by", "join", "trend", "compare",
    "percent", "ratio", "breakdown", "distribution",
];

/// Markers matching each capability, used for the intent signal
const SQL_MARKERS: &[&str] = &["query", "sql", "table", "rows", "select", "data"];
const CHART_MARKERS: &[&str] = &["chart", "plot", "graph", "visuali", "bar", "line", "pie"];
const INSIGHT_MARKERS: &[&str] = &["insight", "why", "explain", "summar", "analy", "driver"];

/// Deterministic query analyzer and router
#[derive(Debug, Default)]
pub struct ContextAnalyzer;

impl ContextAnalyzer {
    /// Create an analyzer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Produce an execution plan for a request.
    ///
    /// Fails only when the request declares no capabilities; every other
    /// input routes somewhere.
    pub fn route(&self, request: &QueryRequest) -> Result<ExecutionPlan> {
        if request.required_capabilities.is_empty() {
            return Err(Error::NoCapabilities);
        }

        let text = request.text.to_lowercase();
        let wants_sql = request.requires(Capability::Sql);
        let wants_chart = request.requires(Capability::Chart);
        let wants_insights = request.requires(Capability::Insights);

        let complexity = self.complexity(&text);
        let multi_step = contains_any(&text, MULTI_STEP_MARKERS);

        // Redundancy avoidance dominates: whenever chart and insights are
        // both required, the unified agent leads and the separate agents are
        // only the fallback, regardless of other markers.
        let (strategy, steps) = if wants_chart && wants_insights {
            let mut steps = Vec::with_capacity(4);
            if wants_sql {
                steps.push(AgentKind::Sql);
            }
            steps.extend([AgentKind::Unified, AgentKind::Chart, AgentKind::Insights]);
            (Strategy::Collaborative, steps)
        } else if wants_sql && (wants_chart || wants_insights) && (multi_step || complexity >= 6) {
            let mut steps = vec![AgentKind::Sql];
            if wants_chart {
                steps.push(AgentKind::Chart);
            }
            if wants_insights {
                steps.push(AgentKind::Insights);
            }
            (Strategy::Parallel, steps)
        } else {
            let mut steps: Vec<AgentKind> = Vec::new();
            if wants_sql {
                steps.push(AgentKind::Sql);
            }
            if wants_chart {
                steps.push(AgentKind::Chart);
            }
            if wants_insights {
                steps.push(AgentKind::Insights);
            }
            steps.sort_by_key(|k| agents::descriptor(*k).priority);
            (Strategy::Sequential, steps)
        };

        let routing_confidence = self.confidence(request, &text);

        debug!(
            request_id = %request.id,
            strategy = %strategy,
            steps = ?steps,
            complexity,
            routing_confidence,
            "execution plan produced"
        );

        Ok(ExecutionPlan {
            strategy,
            steps,
            routing_confidence,
            complexity,
        })
    }

    /// Heuristic complexity on a 0..=10 scale
    fn complexity(&self, text: &str) -> u8 {
        let mut score = 0u8;

        let words = text.split_whitespace().count();
        score += match words {
            0..=8 => 0,
            9..=20 => 2,
            21..=40 => 3,
            _ => 4,
        };

        score += AGGREGATION_MARKERS
            .iter()
            .filter(|m| text.contains(**m))
            .count()
            .min(4) as u8;

        if contains_any(text, MULTI_STEP_MARKERS) {
            score += 2;
        }

        score.min(10)
    }

    /// Coverage ratio over the five routing signals the analyzer inspects:
    /// declared capabilities, matching intent markers, analytical markers,
    /// caller role, caller expertise.
    fn confidence(&self, request: &QueryRequest, text: &str) -> f64 {
        let mut resolved = 0u32;
        let total = 5u32;

        if !request.required_capabilities.is_empty() {
            resolved += 1;
        }
        if self.intent_matches(request, text) {
            resolved += 1;
        }
        if contains_any(text, AGGREGATION_MARKERS) {
            resolved += 1;
        }
        if request.user_context.role.is_some() {
            resolved += 1;
        }
        if request.user_context.expertise.is_some() {
            resolved += 1;
        }

        f64::from(resolved) / f64::from(total)
    }

    /// Whether the query text itself mentions any declared capability
    fn intent_matches(&self, request: &QueryRequest, text: &str) -> bool {
        request.required_capabilities.iter().any(|cap| {
            let markers = match cap {
                Capability::Sql => SQL_MARKERS,
                Capability::Chart => CHART_MARKERS,
                Capability::Insights => INSIGHT_MARKERS,
            };
            contains_any(text, markers)
        })
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

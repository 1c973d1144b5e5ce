//! Incoming query request types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A capability the caller requires from the orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Generate a SQL query answering the question
    Sql,
    /// Generate a chart configuration
    Chart,
    /// Generate narrative insights
    Insights,
}

impl Capability {
    /// Stable lowercase name, used in logs and plan descriptions
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Sql => "sql",
            Capability::Chart => "chart",
            Capability::Insights => "insights",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Self-reported expertise of the requesting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertiseLevel {
    /// Needs explanations alongside artifacts
    Beginner,
    /// Comfortable reading SQL and charts
    Intermediate,
    /// Wants raw artifacts, minimal prose
    Expert,
}

/// Caller context attached to a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    /// Business role of the user (e.g. "analyst", "executive")
    #[serde(default)]
    pub role: Option<String>,
    /// Expertise level, when the caller knows it
    #[serde(default)]
    pub expertise: Option<ExpertiseLevel>,
    /// Organization identifier for multi-tenant callers
    #[serde(default)]
    pub org_id: Option<String>,
}

/// A validated orchestration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Unique request id, generated at admission
    pub id: Uuid,
    /// Natural-language analytics question
    pub text: String,
    /// Caller context
    pub user_context: UserContext,
    /// Capabilities the response must cover
    pub required_capabilities: HashSet<Capability>,
}

impl QueryRequest {
    /// Create a validated request. Fails when the query text is empty.
    pub fn new(
        text: impl Into<String>,
        user_context: UserContext,
        required_capabilities: HashSet<Capability>,
    ) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Validation("query text is empty".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text,
            user_context,
            required_capabilities,
        })
    }

    /// Whether the request requires a given capability
    #[must_use]
    pub fn requires(&self, capability: Capability) -> bool {
        self.required_capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_rejected() {
        let result = QueryRequest::new("   ", UserContext::default(), HashSet::new());
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_valid_request_gets_id() {
        let request = QueryRequest::new(
            "show revenue by month",
            UserContext::default(),
            HashSet::from([Capability::Sql, Capability::Chart]),
        )
        .unwrap();

        assert!(!request.id.is_nil());
        assert!(request.requires(Capability::Chart));
        assert!(!request.requires(Capability::Insights));
    }

    #[test]
    fn test_capability_serde_lowercase() {
        let json = serde_json::to_string(&Capability::Insights).unwrap();
        assert_eq!(json, "\"insights\"");
        let parsed: Capability = serde_json::from_str("\"sql\"").unwrap();
        assert_eq!(parsed, Capability::Sql);
    }
}

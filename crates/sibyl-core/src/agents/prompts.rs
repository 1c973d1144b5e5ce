//! Prompt templates and response schemas per agent

use super::{fields, AgentKind, AgentRequest};
use crate::request::ExpertiseLevel;
use serde_json::{json, Value};

/// Base system prompt for an agent kind
#[must_use]
pub fn system_prompt(kind: AgentKind) -> String {
    match kind {
        AgentKind::Sql => "You are a SQL generation assistant for an analytics platform. \
            Given a business question, produce a single read-only SQL query that answers it. \
            Respond with a JSON object containing a `sql_query` string. \
            Never produce INSERT, UPDATE, DELETE, or DDL statements."
            .to_string(),
        AgentKind::Chart => "You are a chart configuration assistant. \
            Given a business question, produce a JSON object containing a `chart_config` object \
            with `chart_type`, `x_axis`, `y_axis`, and `title` keys suitable for rendering."
            .to_string(),
        AgentKind::Insights => "You are a data insights assistant. \
            Given a business question, produce a JSON object containing an `insights` array \
            of short, concrete observations a business user would act on."
            .to_string(),
        AgentKind::Unified => "You are an analytics assistant producing a complete answer \
            in one pass. Respond with a JSON object containing `chart_config` (an object with \
            `chart_type`, `x_axis`, `y_axis`, `title`), `insights` (an array of short \
            observations), and `executive_summary` (one paragraph). All three keys are required."
            .to_string(),
    }
}

/// JSON schema describing the expected response for an agent kind
#[must_use]
pub fn response_schema(kind: AgentKind) -> Value {
    match kind {
        AgentKind::Sql => json!({
            "type": "object",
            "properties": { fields::SQL_QUERY: { "type": "string" } },
            "required": [fields::SQL_QUERY]
        }),
        AgentKind::Chart => json!({
            "type": "object",
            "properties": { fields::CHART_CONFIG: { "type": "object" } },
            "required": [fields::CHART_CONFIG]
        }),
        AgentKind::Insights => json!({
            "type": "object",
            "properties": {
                fields::INSIGHTS: { "type": "array", "items": { "type": "string" } }
            },
            "required": [fields::INSIGHTS]
        }),
        AgentKind::Unified => json!({
            "type": "object",
            "properties": {
                fields::CHART_CONFIG: { "type": "object" },
                fields::INSIGHTS: { "type": "array", "items": { "type": "string" } },
                fields::EXECUTIVE_SUMMARY: { "type": "string" }
            },
            "required": [
                fields::CHART_CONFIG,
                fields::INSIGHTS,
                fields::EXECUTIVE_SUMMARY
            ]
        }),
    }
}

/// Build the user prompt for an invocation, folding in caller context and
/// fields produced by earlier plan steps.
#[must_use]
pub fn build_prompt(kind: AgentKind, request: &AgentRequest) -> String {
    let mut prompt = format!("Question: {}", request.query);

    if let Some(role) = &request.user_context.role {
        prompt.push_str(&format!("\nRequester role: {role}"));
    }
    match request.user_context.expertise {
        Some(ExpertiseLevel::Beginner) => {
            prompt.push_str("\nAudience: beginner. Keep wording plain.");
        }
        Some(ExpertiseLevel::Expert) => {
            prompt.push_str("\nAudience: expert. Be terse and technical.");
        }
        _ => {}
    }

    if let Some(sql) = request.context.get(fields::SQL_QUERY).and_then(Value::as_str) {
        prompt.push_str(&format!(
            "\nThe data will come from this SQL query:\n{sql}"
        ));
    }

    if kind != AgentKind::Sql && !request.context.is_empty() {
        prompt.push_str("\nBase your answer on the query above, not on invented data.");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::UserContext;
    use uuid::Uuid;

    #[test]
    fn test_schemas_require_descriptor_fields() {
        for kind in AgentKind::all() {
            let schema = response_schema(kind);
            let required: Vec<&str> = schema["required"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(Value::as_str)
                .collect();
            for field in super::super::descriptor(kind).required_fields {
                assert!(required.contains(field), "{kind} schema missing {field}");
            }
        }
    }

    #[test]
    fn test_prompt_includes_upstream_sql() {
        let mut request = AgentRequest::new(
            Uuid::new_v4(),
            "plot weekly signups",
            UserContext::default(),
        );
        request.context.insert(
            fields::SQL_QUERY.to_string(),
            json!("SELECT week, COUNT(*) FROM signups GROUP BY week"),
        );

        let prompt = build_prompt(AgentKind::Chart, &request);
        assert!(prompt.contains("SELECT week"));
        assert!(prompt.contains("plot weekly signups"));
    }

    #[test]
    fn test_prompt_reflects_expertise() {
        let request = AgentRequest::new(
            Uuid::new_v4(),
            "churn drivers",
            UserContext {
                role: Some("executive".into()),
                expertise: Some(ExpertiseLevel::Beginner),
                org_id: None,
            },
        );
        let prompt = build_prompt(AgentKind::Insights, &request);
        assert!(prompt.contains("executive"));
        assert!(prompt.contains("beginner"));
    }
}

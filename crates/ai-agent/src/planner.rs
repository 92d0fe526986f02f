use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::language_model::{ChatMessage, LanguageModelClient, ModelOptions};
use crate::mcp::{CallContext, McpToolDescription};
use crate::plan::ToolCallPlan;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("language model call failed: {0:#}")]
    Model(anyhow::Error),
    #[error("language model returned an empty reply")]
    EmptyModelResponse,
    #[error("invalid tool call plan format: {source}\nmodel output: {raw}")]
    InvalidPlanFormat {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
    #[error("plan generation cancelled")]
    Cancelled,
}

/// Turns a user query into a [`ToolCallPlan`] with a single model call.
#[derive(Clone)]
pub struct PlanGenerator {
    model: Arc<dyn LanguageModelClient>,
    options: ModelOptions,
}

impl PlanGenerator {
    pub fn new(model: Arc<dyn LanguageModelClient>, options: ModelOptions) -> Self {
        Self { model, options }
    }

    pub fn build_messages(&self, query: &str, tools: &[McpToolDescription]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(build_tool_prompt(tools)),
            ChatMessage::user(format!(
                "User query: {query}\n{}",
                PLAN_FORMAT_INSTRUCTION.trim()
            )),
        ]
    }

    pub async fn generate(
        &self,
        ctx: &CallContext,
        query: &str,
        tools: &[McpToolDescription],
    ) -> Result<ToolCallPlan, PlanError> {
        let messages = self.build_messages(query, tools);
        let response = tokio::select! {
            _ = ctx.token().cancelled() => return Err(PlanError::Cancelled),
            response = self.model.generate(&messages, &self.options) => {
                response.map_err(PlanError::Model)?
            }
        };

        if response.text.trim().is_empty() {
            return Err(PlanError::EmptyModelResponse);
        }
        debug!(raw = %response.text, "model produced plan reply");

        ToolCallPlan::parse(&response.text).map_err(|source| PlanError::InvalidPlanFormat {
            source,
            raw: response.text,
        })
    }
}

pub fn build_tool_prompt(tools: &[McpToolDescription]) -> String {
    let entries: Vec<String> = tools
        .iter()
        .map(|tool| {
            let params: Vec<String> = tool
                .parameters
                .iter()
                .map(|(name, spec)| match &spec.description {
                    Some(desc) => format!("{} ({}): {}", name, spec.kind, desc),
                    None => format!("{} ({})", name, spec.kind),
                })
                .collect();
            format!(
                "- tool: {}\n  description: {}\n  parameters:\n    {}",
                tool.name,
                tool.description,
                params.join("\n    ")
            )
        })
        .collect();

    format!(
        "You can use the following tools to answer the user's question:\n{}\n\
         Generate a tool call plan (JSON) for the user's question.",
        entries.join("\n\n")
    )
}

const PLAN_FORMAT_INSTRUCTION: &str = r#"
Generate a tool call plan in JSON describing which tools to call, their parameters and why.
Respond ONLY with JSON of this shape, steps in execution order:
{"steps": [{"tool_name": "<tool>", "params": {"<name>": "<value>"}, "reason": "<why>"}]}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language_model::ChatRole;
    use crate::testing::ScriptedModel;
    use serde_json::json;

    fn tools() -> Vec<McpToolDescription> {
        vec![
            McpToolDescription::new("web_search", "Web search for real-time information")
                .with_required_parameter("query", "string", Some("search keywords"))
                .with_parameter("limit", "integer", None),
            McpToolDescription::new("browseruse", "Real browser operations"),
        ]
    }

    #[test]
    fn prompt_lists_every_tool_with_flattened_parameters() {
        let prompt = build_tool_prompt(&tools());
        assert!(prompt.contains("- tool: web_search"));
        assert!(prompt.contains("description: Web search for real-time information"));
        assert!(prompt.contains("query (string): search keywords"));
        assert!(prompt.contains("limit (integer)"));
        assert!(prompt.contains("- tool: browseruse"));
    }

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let model = ScriptedModel::new(vec![json!({ "steps": [] }).to_string()]);
        let planner = PlanGenerator::new(model.clone(), ModelOptions::default());

        let plan = planner
            .generate(&CallContext::new(), "weather in Paris", &tools())
            .await
            .unwrap();
        assert!(plan.is_empty());

        let calls = model.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][0].role, ChatRole::System);
        assert_eq!(calls[0][1].role, ChatRole::User);
        assert!(calls[0][1].content.contains("weather in Paris"));
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let model = ScriptedModel::new(vec!["   ".to_string()]);
        let planner = PlanGenerator::new(model, ModelOptions::default());
        let err = planner
            .generate(&CallContext::new(), "anything", &tools())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::EmptyModelResponse));
    }

    #[tokio::test]
    async fn malformed_reply_keeps_raw_output() {
        let model = ScriptedModel::new(vec!["Sure! First I will search.".to_string()]);
        let planner = PlanGenerator::new(model, ModelOptions::default());
        let err = planner
            .generate(&CallContext::new(), "anything", &tools())
            .await
            .unwrap_err();
        match err {
            PlanError::InvalidPlanFormat { raw, .. } => {
                assert_eq!(raw, "Sure! First I will search.")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cancelled_context_aborts_generation() {
        let model = ScriptedModel::pending();
        let planner = PlanGenerator::new(model, ModelOptions::default());
        let ctx = CallContext::new();
        ctx.cancel();
        let err = planner.generate(&ctx, "anything", &tools()).await.unwrap_err();
        assert!(matches!(err, PlanError::Cancelled));
    }
}

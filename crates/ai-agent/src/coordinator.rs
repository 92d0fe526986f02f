use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mcp::{CallContext, McpCallRequest, McpToolError, ToolCatalog, ToolNotFound};
use crate::plan::ToolCallPlan;
use crate::planner::{PlanError, PlanGenerator};

#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    NotFound(#[from] ToolNotFound),
    #[error(transparent)]
    Invocation(McpToolError),
    #[error("tool reported an error: {0}")]
    Reported(String),
    #[error("result carried no text content")]
    UnsupportedContent,
    #[error("call cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to generate tool call plan: {0}")]
    Plan(#[from] PlanError),
    #[error("step {} ({tool_name}) failed: {cause}", .index + 1)]
    StepFailed {
        index: usize,
        tool_name: String,
        #[source]
        cause: StepFailure,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    ModelResponse { steps: usize },
    ToolCall { index: usize, name: String, args: Value },
    ToolResult { index: usize, name: String, text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Text of the last executed step; `None` for an empty plan.
    pub answer: Option<String>,
    pub plan: ToolCallPlan,
    pub events: Vec<AgentEvent>,
}

/// Runs generated plans step by step against a [`ToolCatalog`].
#[derive(Clone)]
pub struct Coordinator {
    planner: PlanGenerator,
    catalog: Arc<dyn ToolCatalog>,
}

impl Coordinator {
    pub fn new(planner: PlanGenerator, catalog: Arc<dyn ToolCatalog>) -> Self {
        Self { planner, catalog }
    }

    pub async fn run(
        &self,
        ctx: &CallContext,
        query: &str,
    ) -> Result<RunOutcome, CoordinatorError> {
        debug!(state = "generating_plan", %query);
        let tools = self.catalog.descriptors();
        let plan = self.planner.generate(ctx, query, &tools).await?;
        info!(steps = plan.len(), "tool call plan generated");

        let mut outcome = self.execute_plan(ctx, plan).await?;
        outcome.events.insert(
            0,
            AgentEvent::ModelResponse {
                steps: outcome.plan.len(),
            },
        );
        Ok(outcome)
    }

    /// Executes `plan` in order and stops at the first failing step. Only
    /// the last step's text survives as the answer.
    pub async fn execute_plan(
        &self,
        ctx: &CallContext,
        plan: ToolCallPlan,
    ) -> Result<RunOutcome, CoordinatorError> {
        let mut events = Vec::with_capacity(plan.len() * 2);
        let mut answer = None;

        for (index, step) in plan.steps.iter().enumerate() {
            debug!(state = "executing_step", index, tool = %step.tool_name, reason = %step.reason);
            let fail = |cause: StepFailure| {
                warn!(index, tool = %step.tool_name, error = %cause, "plan step failed");
                CoordinatorError::StepFailed {
                    index,
                    tool_name: step.tool_name.clone(),
                    cause,
                }
            };

            let tool = self.catalog.lookup(&step.tool_name).map_err(|e| fail(e.into()))?;
            events.push(AgentEvent::ToolCall {
                index,
                name: step.tool_name.clone(),
                args: step.params.clone(),
            });

            let request = McpCallRequest::from_value(step.params.clone());
            let result = tokio::select! {
                _ = ctx.token().cancelled() => return Err(fail(StepFailure::Cancelled)),
                result = tool.call(ctx, request) => result,
            };
            let result = match result {
                Ok(result) => result,
                Err(McpToolError::Cancelled) => return Err(fail(StepFailure::Cancelled)),
                Err(err) => return Err(fail(StepFailure::Invocation(err))),
            };
            if result.is_error {
                return Err(fail(StepFailure::Reported(result.text_summary())));
            }

            let text = result
                .first_text()
                .ok_or_else(|| fail(StepFailure::UnsupportedContent))?
                .to_string();
            events.push(AgentEvent::ToolResult {
                index,
                name: step.tool_name.clone(),
                text: text.clone(),
            });
            answer = Some(text);
        }

        debug!(state = "completed", steps = plan.len());
        Ok(RunOutcome {
            answer,
            plan,
            events,
        })
    }
}

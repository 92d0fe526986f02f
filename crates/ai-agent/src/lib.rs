//! Tool calling primitives shared by the runtime workspace.
//! The crate defines the uniform tool contract, the language model seam, the
//! plan generator that turns a query into an ordered tool call plan, and the
//! coordinator that executes such a plan against a tool catalog.

pub mod coordinator;
pub mod language_model;
pub mod mcp;
pub mod plan;
pub mod planner;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use coordinator::{AgentEvent, Coordinator, CoordinatorError, RunOutcome, StepFailure};
pub use language_model::{
    ChatMessage, ChatRole, LanguageModelClient, LanguageModelResponse, LanguageModelUsage,
    ModelOptions,
};
pub use mcp::{
    CallArguments, CallContext, ContentBlock, McpCallRequest, McpTool, McpToolDescription,
    McpToolError, McpToolResult, McpToolResultT, ParameterSpec, ToolCatalog, ToolNotFound,
};
pub use plan::{ToolCallPlan, ToolCallStep};
pub use planner::{PlanError, PlanGenerator};

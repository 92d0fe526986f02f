//! Tool fakes for the registry, chain and runtime tests. The model and
//! catalog fakes come from `ai_agent::testing`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ai_agent::{
    CallContext, McpCallRequest, McpTool, McpToolDescription, McpToolError, McpToolResult,
    McpToolResultT,
};
use async_trait::async_trait;

pub use ai_agent::testing::{Behaviour, CountingTool, ScriptedModel, StaticCatalog};

/// Replies with `"{prefix}:{query}"`.
pub struct EchoTool {
    description: McpToolDescription,
    prefix: String,
}

impl EchoTool {
    pub fn new(name: &str, prefix: &str) -> Arc<Self> {
        Arc::new(Self {
            description: McpToolDescription::new(name, format!("echoes the query for {name}"))
                .with_required_parameter("query", "string", Some("text to echo")),
            prefix: prefix.to_string(),
        })
    }
}

#[async_trait]
impl McpTool for EchoTool {
    fn description(&self) -> &McpToolDescription {
        &self.description
    }

    async fn call(&self, _ctx: &CallContext, request: McpCallRequest) -> McpToolResultT {
        let query = request
            .arguments
            .get_str("query")
            .ok_or_else(|| McpToolError::InvalidInput("query is required".into()))?;
        Ok(McpToolResult::text(format!("{}:{}", self.prefix, query)))
    }
}

/// Pops one canned outcome per call and records every request.
pub struct ScriptedTool {
    description: McpToolDescription,
    outcomes: Mutex<VecDeque<McpToolResultT>>,
    requests: Mutex<Vec<McpCallRequest>>,
}

impl ScriptedTool {
    pub fn new(name: &str, outcomes: Vec<McpToolResultT>) -> Arc<Self> {
        Arc::new(Self {
            description: McpToolDescription::new(name, format!("{name} test tool")),
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<McpCallRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl McpTool for ScriptedTool {
    fn description(&self) -> &McpToolDescription {
        &self.description
    }

    async fn call(&self, _ctx: &CallContext, request: McpCallRequest) -> McpToolResultT {
        self.requests.lock().unwrap().push(request);
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(McpToolError::Invocation(format!(
                "{} has no scripted outcome left",
                self.description.name
            )))
        })
    }
}

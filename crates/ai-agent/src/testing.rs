//! Scripted fakes for the model and tool seams. Compiled for this crate's
//! tests and, behind the `test-support` feature, for dependent crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::language_model::{ChatMessage, LanguageModelClient, LanguageModelResponse, ModelOptions};
use crate::mcp::{
    CallContext, McpCallRequest, McpTool, McpToolDescription, McpToolError, McpToolResult,
    McpToolResultT, ToolCatalog, ToolNotFound,
};

pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    pending: bool,
}

impl ScriptedModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            pending: false,
        })
    }

    /// A model whose reply never arrives.
    pub fn pending() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            pending: true,
        })
    }

    pub async fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LanguageModelClient for ScriptedModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _options: &ModelOptions,
    ) -> Result<LanguageModelResponse> {
        self.calls.lock().await.push(messages.to_vec());
        if self.pending {
            std::future::pending::<()>().await;
        }
        let next = self
            .responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model ran out of responses"))?;
        Ok(LanguageModelResponse::new(next))
    }
}

pub enum Behaviour {
    Reply(McpToolResult),
    Fail(String),
    Hang,
}

/// Tool with a canned behaviour that counts how often it was called.
pub struct CountingTool {
    description: McpToolDescription,
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_request: std::sync::Mutex<Option<McpCallRequest>>,
}

impl CountingTool {
    pub fn new(name: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            description: McpToolDescription::new(name, format!("{name} test tool")),
            behaviour,
            calls: AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        })
    }

    pub fn replying(name: &str, text: &str) -> Arc<Self> {
        Self::new(name, Behaviour::Reply(McpToolResult::text(text)))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<McpCallRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl McpTool for CountingTool {
    fn description(&self) -> &McpToolDescription {
        &self.description
    }

    async fn call(&self, _ctx: &CallContext, request: McpCallRequest) -> McpToolResultT {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        match &self.behaviour {
            Behaviour::Reply(result) => Ok(result.clone()),
            Behaviour::Fail(message) => Err(McpToolError::Invocation(message.clone())),
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[derive(Default)]
pub struct StaticCatalog {
    tools: IndexMap<String, Arc<dyn McpTool>>,
}

impl StaticCatalog {
    pub fn with(mut self, tool: Arc<dyn McpTool>) -> Self {
        self.tools.insert(tool.description().name.clone(), tool);
        self
    }
}

impl ToolCatalog for StaticCatalog {
    fn lookup(&self, name: &str) -> Result<Arc<dyn McpTool>, ToolNotFound> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolNotFound(name.to_string()))
    }

    fn descriptors(&self) -> Vec<McpToolDescription> {
        self.tools
            .values()
            .map(|tool| tool.description().clone())
            .collect()
    }
}

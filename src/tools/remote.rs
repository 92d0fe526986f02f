use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ai_agent::{
    CallContext, McpCallRequest, McpTool, McpToolDescription, McpToolError, McpToolResult,
    McpToolResultT,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Per-tool configuration for a capability served by a remote MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteToolConfig {
    pub endpoint: String,
    /// Name of the tool on the remote server when it differs from ours.
    #[serde(default)]
    pub remote_name: Option<String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Overrides the built-in description shown to the planner.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Option<Value>,
}

/// Capability whose calls are forwarded as JSON-RPC `tools/call` requests.
pub struct RemoteMcpTool {
    description: McpToolDescription,
    remote_name: String,
    endpoint: String,
    headers: IndexMap<String, String>,
    client: Client,
    request_id: AtomicU64,
}

impl RemoteMcpTool {
    pub fn new(description: McpToolDescription, config: RemoteToolConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(anyhow!(
                "tool {} requires a non-empty endpoint",
                description.name
            ));
        }
        let timeout = Duration::from_millis(config.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            remote_name: config
                .remote_name
                .unwrap_or_else(|| description.name.clone()),
            description,
            endpoint: config.endpoint,
            headers: config.headers,
            client,
            request_id: AtomicU64::new(1),
        })
    }

    fn missing_required(&self, request: &McpCallRequest) -> Option<&str> {
        let arguments = request.arguments.to_value();
        self.description
            .required
            .iter()
            .find(|name| match arguments.get(name.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(String::as_str)
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("failed to read response from {}", self.endpoint))?;
        if !status.is_success() {
            return Err(anyhow!("{} returned HTTP {}: {}", self.endpoint, status, text.trim()));
        }
        let payload: Value = serde_json::from_str(&text)
            .with_context(|| format!("invalid response from {}", self.endpoint))?;
        extract_result(payload)
    }
}

fn extract_result(payload: Value) -> Result<Value> {
    if let Some(error) = payload.get("error") {
        return Err(anyhow!("remote server returned error: {error}"));
    }
    match payload.get("result") {
        Some(result) => Ok(result.clone()),
        None => Ok(payload),
    }
}

#[async_trait]
impl McpTool for RemoteMcpTool {
    fn description(&self) -> &McpToolDescription {
        &self.description
    }

    async fn call(&self, ctx: &CallContext, request: McpCallRequest) -> McpToolResultT {
        if let Some(name) = self.missing_required(&request) {
            return Ok(McpToolResult::error(format!(
                "missing required parameter {name}"
            )));
        }
        let params = json!({
            "name": self.remote_name,
            "arguments": request.arguments.to_value(),
        });
        debug!(tool = %self.description.name, endpoint = %self.endpoint, "forwarding tool call");

        let result = tokio::select! {
            _ = ctx.token().cancelled() => return Err(McpToolError::Cancelled),
            result = self.send_request("tools/call", params) => result,
        };
        let result = result.map_err(|err| McpToolError::Invocation(format!("{err:#}")))?;
        serde_json::from_value(result).map_err(|err| {
            McpToolError::Invocation(format!("invalid tool call response: {err}"))
        })
    }
}

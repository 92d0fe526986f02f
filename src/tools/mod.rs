//! Built-in capability recipes. Every capability is served by a remote MCP
//! server; the recipes only differ in the descriptor they advertise.

mod remote;

use std::sync::Arc;

use agent_core::{Dependencies, RegistryError, ToolConfig, ToolRecipe, ToolRegistry};
use ai_agent::{McpTool, McpToolDescription};
use anyhow::{Context, Result};
use async_trait::async_trait;

pub use remote::{RemoteMcpTool, RemoteToolConfig};

pub const WEB_SEARCH: &str = "web_search";
pub const BROWSER: &str = "browseruse";
pub const VECTOR_SEARCH: &str = "vector_search";

pub fn default_enabled_tools() -> Vec<String> {
    vec![WEB_SEARCH.into(), BROWSER.into(), VECTOR_SEARCH.into()]
}

/// Descriptor advertised for a built-in capability, `None` for unknown names.
pub fn builtin_description(name: &str) -> Option<McpToolDescription> {
    let description = match name {
        WEB_SEARCH => McpToolDescription::new(
            WEB_SEARCH,
            "Web search tool for fetching up-to-date information",
        )
        .with_required_parameter("query", "string", Some("search keywords")),
        BROWSER => McpToolDescription::new(
            BROWSER,
            "Real browser automation (navigation, content extraction and so on)",
        )
        .with_required_parameter(
            "action",
            "string",
            Some("action type (go_to_url, click_element, extract_content, ...)"),
        )
        .with_parameter("url", "string", Some("target URL for navigation or a new tab"))
        .with_parameter("goal", "string", Some("extraction goal for extract_content"))
        .with_parameter("index", "string", Some("element index"))
        .with_parameter("scroll_amount", "string", Some("pixels to scroll"))
        .with_parameter("tab_id", "string", Some("tab identifier"))
        .with_parameter("query", "string", Some("search query")),
        VECTOR_SEARCH => McpToolDescription::new(
            VECTOR_SEARCH,
            "Finds site features and their entry URLs (tickets, hotel booking, ...) \
             matching a user question",
        )
        .with_required_parameter(
            "query",
            "string",
            Some("retrieval text; the most relevant resources are matched against it"),
        ),
        _ => return None,
    };
    Some(description)
}

/// Builds a [`RemoteMcpTool`] from a [`RemoteToolConfig`] blob.
pub struct RemoteRecipe {
    name: String,
}

impl RemoteRecipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn description(&self, config: &RemoteToolConfig) -> McpToolDescription {
        let base = builtin_description(&self.name);
        let text = config
            .description
            .clone()
            .or_else(|| base.as_ref().map(|d| d.description.clone()))
            .unwrap_or_else(|| format!("remote tool {}", self.name));
        match (&config.input_schema, base) {
            (Some(schema), _) => McpToolDescription::from_input_schema(&self.name, text, schema),
            (None, Some(mut base)) => {
                base.description = text;
                base
            }
            (None, None) => McpToolDescription::new(&self.name, text),
        }
    }
}

#[async_trait]
impl ToolRecipe for RemoteRecipe {
    async fn construct(
        &self,
        config: &ToolConfig,
        _deps: &Dependencies,
    ) -> Result<Arc<dyn McpTool>> {
        let config: RemoteToolConfig = config
            .decode()
            .with_context(|| format!("invalid configuration for tool {}", self.name))?;
        let tool = RemoteMcpTool::new(self.description(&config), config)?;
        Ok(Arc::new(tool))
    }
}

/// Registers one remote recipe per enabled tool name.
pub fn register_enabled(
    registry: &mut ToolRegistry,
    enabled: &[String],
) -> Result<(), RegistryError> {
    for name in enabled {
        registry.register_recipe(name.clone(), RemoteRecipe::new(name.clone()))?;
    }
    Ok(())
}

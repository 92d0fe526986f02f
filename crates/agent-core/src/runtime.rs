use std::sync::Arc;

use ai_agent::{
    CallContext, Coordinator, CoordinatorError, LanguageModelClient, McpTool, McpToolDescription,
    ModelOptions, PlanGenerator, RunOutcome, ToolCatalog,
};

use crate::pipeline::{ChainError, ChainSettings, ToolChain};
use crate::registry::{RegistryError, ToolRegistry};

/// Facade over a constructed registry exposing both query paths: the
/// model-planned coordinator and the fixed tool chain.
#[derive(Clone)]
pub struct AgentRuntime {
    registry: Arc<ToolRegistry>,
    coordinator: Coordinator,
    chain: ToolChain,
}

impl AgentRuntime {
    pub fn builder(model: Arc<dyn LanguageModelClient>) -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new(model)
    }

    pub async fn run(
        &self,
        ctx: &CallContext,
        query: &str,
    ) -> Result<RunOutcome, CoordinatorError> {
        self.coordinator.run(ctx, query).await
    }

    pub async fn run_chain(
        &self,
        ctx: &CallContext,
        query: &str,
        goal: &str,
    ) -> Result<String, ChainError> {
        self.chain.execute_chain(ctx, query, goal).await
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn tool_descriptions(&self) -> Vec<McpToolDescription> {
        self.registry.list_descriptors()
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn McpTool>, RegistryError> {
        self.registry.lookup(name)
    }
}

pub struct AgentRuntimeBuilder {
    model: Arc<dyn LanguageModelClient>,
    options: ModelOptions,
    chain: ChainSettings,
    registry: Option<Arc<ToolRegistry>>,
}

impl AgentRuntimeBuilder {
    fn new(model: Arc<dyn LanguageModelClient>) -> Self {
        Self {
            model,
            options: ModelOptions::default(),
            chain: ChainSettings::default(),
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_model_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_chain(mut self, settings: ChainSettings) -> Self {
        self.chain = settings;
        self
    }

    pub fn build(self) -> AgentRuntime {
        let registry = self.registry.unwrap_or_default();
        let catalog: Arc<dyn ToolCatalog> = registry.clone();
        let planner = PlanGenerator::new(self.model, self.options);
        AgentRuntime {
            coordinator: Coordinator::new(planner, catalog.clone()),
            chain: ToolChain::new(catalog, self.chain),
            registry,
        }
    }
}

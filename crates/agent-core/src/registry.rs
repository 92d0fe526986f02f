use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ai_agent::{LanguageModelClient, McpTool, McpToolDescription, ToolCatalog, ToolNotFound};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Opaque per-tool configuration. Each recipe decodes it into its own
/// strongly typed struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolConfig(Value);

impl ToolConfig {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.0.clone())
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ToolConfig {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Shared handles given to every recipe. Built once at startup.
#[derive(Clone)]
pub struct Dependencies {
    pub model: Arc<dyn LanguageModelClient>,
}

impl Dependencies {
    pub fn new(model: Arc<dyn LanguageModelClient>) -> Self {
        Self { model }
    }
}

/// Factory producing one tool from its configuration.
#[async_trait]
pub trait ToolRecipe: Send + Sync {
    async fn construct(
        &self,
        config: &ToolConfig,
        deps: &Dependencies,
    ) -> anyhow::Result<Arc<dyn McpTool>>;
}

/// Adapts a synchronous closure into a [`ToolRecipe`].
pub struct FnRecipe<F>(F);

pub fn recipe_fn<F>(f: F) -> FnRecipe<F>
where
    F: Fn(&ToolConfig, &Dependencies) -> anyhow::Result<Arc<dyn McpTool>> + Send + Sync,
{
    FnRecipe(f)
}

#[async_trait]
impl<F> ToolRecipe for FnRecipe<F>
where
    F: Fn(&ToolConfig, &Dependencies) -> anyhow::Result<Arc<dyn McpTool>> + Send + Sync,
{
    async fn construct(
        &self,
        config: &ToolConfig,
        deps: &Dependencies,
    ) -> anyhow::Result<Arc<dyn McpTool>> {
        (self.0)(config, deps)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool {0} not found")]
    NotFound(String),
    #[error("missing configuration for tool {0}")]
    MissingConfiguration(String),
    #[error("failed to initialise tool {name}: {source:#}")]
    ConstructionFailed {
        name: String,
        source: anyhow::Error,
    },
    #[error("tools have already been constructed")]
    AlreadyConstructed,
}

impl From<RegistryError> for ToolNotFound {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => ToolNotFound(name),
            other => ToolNotFound(other.to_string()),
        }
    }
}

/// Owns tool recipes and the tools built from them.
///
/// Recipes are registered first, then [`ToolRegistry::construct_all`] builds
/// every tool exactly once. After that the registry is read-only and lookups
/// only take the shared side of the lock.
#[derive(Default)]
pub struct ToolRegistry {
    recipes: IndexMap<String, Arc<dyn ToolRecipe>>,
    tools: RwLock<IndexMap<String, Arc<dyn McpTool>>>,
    constructed: AtomicBool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `recipe` under `name`. A second registration under the same
    /// name replaces the first.
    pub fn register_recipe(
        &mut self,
        name: impl Into<String>,
        recipe: impl ToolRecipe + 'static,
    ) -> Result<(), RegistryError> {
        if self.is_constructed() {
            return Err(RegistryError::AlreadyConstructed);
        }
        let name = name.into();
        if self.recipes.insert(name.clone(), Arc::new(recipe)).is_some() {
            warn!(tool = %name, "tool recipe registered twice, keeping the latest");
        }
        Ok(())
    }

    pub fn recipe_names(&self) -> Vec<String> {
        self.recipes.keys().cloned().collect()
    }

    /// Builds every registered tool from `configs`. Either all tools are
    /// committed or none: a failure leaves the registry empty so the call can
    /// be retried from scratch.
    pub async fn construct_all(
        &self,
        configs: &IndexMap<String, ToolConfig>,
        deps: &Dependencies,
    ) -> Result<usize, RegistryError> {
        if self.is_constructed() {
            return Err(RegistryError::AlreadyConstructed);
        }

        let mut staged: IndexMap<String, Arc<dyn McpTool>> = IndexMap::new();
        for (name, recipe) in &self.recipes {
            let config = configs
                .get(name)
                .ok_or_else(|| RegistryError::MissingConfiguration(name.clone()))?;
            let tool = recipe.construct(config, deps).await.map_err(|source| {
                RegistryError::ConstructionFailed {
                    name: name.clone(),
                    source,
                }
            })?;
            let described = &tool.description().name;
            if described != name {
                return Err(RegistryError::ConstructionFailed {
                    name: name.clone(),
                    source: anyhow::anyhow!("recipe produced a tool named {described}"),
                });
            }
            info!(tool = %name, "tool initialised");
            staged.insert(name.clone(), tool);
        }

        let count = staged.len();
        let mut tools = self.write();
        if self.constructed.swap(true, Ordering::AcqRel) {
            return Err(RegistryError::AlreadyConstructed);
        }
        *tools = staged;
        Ok(count)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn McpTool>, RegistryError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn list_descriptors(&self) -> Vec<McpToolDescription> {
        self.read()
            .values()
            .map(|tool| tool.description().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed.load(Ordering::Acquire)
    }

    // The map is only ever replaced wholesale, so a poisoned lock still
    // guards a consistent value.
    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Arc<dyn McpTool>>> {
        self.tools.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Arc<dyn McpTool>>> {
        self.tools.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ToolCatalog for ToolRegistry {
    fn lookup(&self, name: &str) -> Result<Arc<dyn McpTool>, ToolNotFound> {
        ToolRegistry::lookup(self, name).map_err(ToolNotFound::from)
    }

    fn descriptors(&self) -> Vec<McpToolDescription> {
        self.list_descriptors()
    }
}

//! Tool registry, fixed tool chain and runtime facade for the tool runtime
//! workspace.

pub mod pipeline;
pub mod registry;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{ChainError, ChainErrorKind, ChainSettings, ChainStage, SearchHit, ToolChain};
pub use registry::{
    recipe_fn, Dependencies, FnRecipe, RegistryError, ToolConfig, ToolRecipe, ToolRegistry,
};
pub use runtime::{AgentRuntime, AgentRuntimeBuilder};

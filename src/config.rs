use std::fs;
use std::path::Path;

use agent_core::{ChainSettings, ToolConfig};
use ai_agent::ModelOptions;
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use llm_router::ProviderConfig;
use serde::Deserialize;

use crate::tools::default_enabled_tools;

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub server_port: u16,
    /// Upper bound for one HTTP request; the running plan is cancelled when
    /// it elapses.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub model: ProviderConfig,
    #[serde(default)]
    pub planner: ModelOptions,
    #[serde(default = "default_enabled_tools")]
    pub enabled_tools: Vec<String>,
    #[serde(default)]
    pub tools: IndexMap<String, ToolConfig>,
    #[serde(default)]
    pub chain: ChainSettings,
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than zero");
        }
        if self.chain.result_limit == 0 {
            bail!("chain.result_limit must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"{
                "server_port": 9000,
                "request_timeout_ms": 5000,
                "model": {
                    "base_url": "http://localhost:11434/v1",
                    "model": "qwen-plus",
                    "api_key_env": null
                },
                "planner": { "temperature": 0.0, "max_tokens": 512 },
                "enabled_tools": ["web_search"],
                "tools": { "web_search": { "endpoint": "http://localhost:7000/mcp" } },
                "chain": { "result_limit": 3 }
            }"#,
        );
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.model.model, "qwen-plus");
        assert!(config.model.api_key_env.is_none());
        assert_eq!(config.planner.max_tokens, Some(512));
        assert_eq!(config.enabled_tools, vec!["web_search".to_string()]);
        assert_eq!(
            config.tools["web_search"].raw()["endpoint"],
            "http://localhost:7000/mcp"
        );
        assert_eq!(config.chain.result_limit, 3);
        assert_eq!(config.chain.search_tool, "web_search");
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = write_config("{}");
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.enabled_tools.len(), 3);
        assert!(config.tools.is_empty());
        assert_eq!(config.chain, ChainSettings::default());
    }

    #[test]
    fn rejects_invalid_files() {
        assert!(AppConfig::load("/nonexistent/config.json").is_err());

        let file = write_config("{ not json");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));

        let file = write_config(r#"{ "request_timeout_ms": 0 }"#);
        assert!(AppConfig::load(file.path()).is_err());
    }
}

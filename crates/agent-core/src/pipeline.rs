use std::fmt;
use std::sync::Arc;

use ai_agent::{CallContext, McpCallRequest, McpTool, McpToolError, ToolCatalog};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_SEARCH_TOOL: &str = "web_search";
pub const DEFAULT_BROWSER_TOOL: &str = "browseruse";
pub const DEFAULT_RESULT_LIMIT: usize = 5;

const TAB_ID_KEYS: [&str; 3] = ["tab_id", "tabId", "TabID"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub search_tool: String,
    pub browser_tool: String,
    pub result_limit: usize,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            search_tool: DEFAULT_SEARCH_TOOL.to_string(),
            browser_tool: DEFAULT_BROWSER_TOOL.to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStage {
    Search,
    Select,
    Navigate,
    Extract,
}

impl ChainStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Select => "select",
            Self::Navigate => "navigate",
            Self::Extract => "extract",
        }
    }
}

impl fmt::Display for ChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ChainErrorKind {
    #[error("tool {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Invocation(McpToolError),
    #[error("tool reported an error: {0}")]
    Reported(String),
    #[error("result carried no text content")]
    UnsupportedContent,
    #[error("malformed search result: {0}")]
    MalformedResult(#[source] serde_json::Error),
    #[error("search returned no results")]
    EmptySearchResult,
    #[error("first search result has no url")]
    MissingUrl,
    #[error("navigation failed: {0}")]
    NavigationFailed(String),
    #[error("chain cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {kind}")]
pub struct ChainError {
    pub stage: ChainStage,
    #[source]
    pub kind: ChainErrorKind,
}

impl ChainError {
    fn new(stage: ChainStage, kind: ChainErrorKind) -> Self {
        warn!(%stage, error = %kind, "tool chain aborted");
        Self { stage, kind }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Fixed search, navigate and extract pipeline over two catalog tools.
#[derive(Clone)]
pub struct ToolChain {
    catalog: Arc<dyn ToolCatalog>,
    settings: ChainSettings,
}

impl ToolChain {
    pub fn new(catalog: Arc<dyn ToolCatalog>, settings: ChainSettings) -> Self {
        Self { catalog, settings }
    }

    /// Searches for `query`, opens the first hit and extracts content for
    /// `goal` from it. Every stage runs only after the previous one succeeded.
    pub async fn execute_chain(
        &self,
        ctx: &CallContext,
        query: &str,
        goal: &str,
    ) -> Result<String, ChainError> {
        let search = self.resolve(ChainStage::Search, &self.settings.search_tool)?;
        let mut args = Map::new();
        args.insert("query".into(), json!(query));
        args.insert("limit".into(), json!(self.settings.result_limit));
        let text = call_text(ctx, ChainStage::Search, &search, args).await?;

        let parsed: SearchResults = serde_json::from_str(&text).map_err(|err| {
            ChainError::new(ChainStage::Search, ChainErrorKind::MalformedResult(err))
        })?;
        debug!(hits = parsed.results.len(), "search finished");

        let first = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::new(ChainStage::Search, ChainErrorKind::EmptySearchResult))?;
        if first.url.trim().is_empty() {
            return Err(ChainError::new(ChainStage::Select, ChainErrorKind::MissingUrl));
        }
        info!(url = %first.url, title = %first.title, "navigating to first search result");

        let browser = self.resolve(ChainStage::Navigate, &self.settings.browser_tool)?;
        let mut args = Map::new();
        args.insert("action".into(), json!("go_to_url"));
        args.insert("url".into(), json!(first.url));
        let text = match call_text(ctx, ChainStage::Navigate, &browser, args).await {
            Err(ChainError {
                stage,
                kind: ChainErrorKind::Reported(message),
            }) => {
                return Err(ChainError {
                    stage,
                    kind: ChainErrorKind::NavigationFailed(message),
                })
            }
            Err(ChainError {
                stage,
                kind: ChainErrorKind::UnsupportedContent,
            }) => {
                return Err(ChainError {
                    stage,
                    kind: ChainErrorKind::NavigationFailed(
                        "navigation result carried no text content".into(),
                    ),
                })
            }
            other => other?,
        };
        let tab_id = parse_tab_id(&text).ok_or_else(|| {
            ChainError::new(
                ChainStage::Navigate,
                ChainErrorKind::NavigationFailed(format!("no tab id in response: {text}")),
            )
        })?;
        debug!(%tab_id, "page opened");

        let mut args = Map::new();
        args.insert("action".into(), json!("extract_content"));
        args.insert("tab_id".into(), tab_id);
        args.insert("goal".into(), json!(goal));
        call_text(ctx, ChainStage::Extract, &browser, args).await
    }

    fn resolve(&self, stage: ChainStage, name: &str) -> Result<Arc<dyn McpTool>, ChainError> {
        self.catalog
            .lookup(name)
            .map_err(|err| ChainError::new(stage, ChainErrorKind::NotFound(err.0)))
    }
}

async fn call_text(
    ctx: &CallContext,
    stage: ChainStage,
    tool: &Arc<dyn McpTool>,
    args: Map<String, Value>,
) -> Result<String, ChainError> {
    let request = McpCallRequest::new(args);
    let result = tokio::select! {
        _ = ctx.token().cancelled() => {
            return Err(ChainError::new(stage, ChainErrorKind::Cancelled));
        }
        result = tool.call(ctx, request) => result,
    };
    let result = match result {
        Ok(result) => result,
        Err(McpToolError::Cancelled) => {
            return Err(ChainError::new(stage, ChainErrorKind::Cancelled))
        }
        Err(err) => return Err(ChainError::new(stage, ChainErrorKind::Invocation(err))),
    };
    if result.is_error {
        return Err(ChainError::new(
            stage,
            ChainErrorKind::Reported(result.text_summary()),
        ));
    }
    result
        .first_text()
        .map(str::to_string)
        .ok_or_else(|| ChainError::new(stage, ChainErrorKind::UnsupportedContent))
}

/// Reads the tab identifier out of a navigation response. Numbers and
/// non-empty strings are accepted under any of the known key spellings.
fn parse_tab_id(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    TAB_ID_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|id| match id {
            Value::Number(_) => true,
            Value::String(s) => !s.trim().is_empty(),
            _ => false,
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behaviour, CountingTool, ScriptedTool, StaticCatalog};
    use ai_agent::{ContentBlock, McpToolResult};
    use indexmap::IndexMap;
    use std::time::Duration;

    fn search_reply(urls: &[&str]) -> McpToolResult {
        let results: Vec<Value> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| json!({ "title": format!("hit {i}"), "url": url, "snippet": "" }))
            .collect();
        McpToolResult::text(json!({ "results": results }).to_string())
    }

    fn chain(search: Arc<ScriptedTool>, browser: Arc<ScriptedTool>) -> ToolChain {
        let catalog = StaticCatalog::default().with(search).with(browser);
        ToolChain::new(Arc::new(catalog), ChainSettings::default())
    }

    #[tokio::test]
    async fn navigates_to_first_result_and_extracts() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["https://first.example", "https://second.example"]))],
        );
        let browser = ScriptedTool::new(
            "browseruse",
            vec![
                Ok(McpToolResult::text(r#"{"TabID": 7}"#)),
                Ok(McpToolResult::text("the extracted content")),
            ],
        );

        let text = chain(search.clone(), browser.clone())
            .execute_chain(&CallContext::new(), "rust async", "summarise")
            .await
            .unwrap();
        assert_eq!(text, "the extracted content");

        let search_args = search.requests()[0].arguments.to_value();
        assert_eq!(search_args, json!({ "query": "rust async", "limit": 5 }));

        let browser_calls = browser.requests();
        assert_eq!(browser_calls.len(), 2);
        assert_eq!(
            browser_calls[0].arguments.to_value(),
            json!({ "action": "go_to_url", "url": "https://first.example" })
        );
        assert_eq!(
            browser_calls[1].arguments.to_value(),
            json!({ "action": "extract_content", "tab_id": 7, "goal": "summarise" })
        );
    }

    #[tokio::test]
    async fn empty_results_skip_navigation() {
        let search = ScriptedTool::new("web_search", vec![Ok(search_reply(&[]))]);
        let browser = ScriptedTool::new("browseruse", vec![]);

        let err = chain(search, browser.clone())
            .execute_chain(&CallContext::new(), "nothing", "goal")
            .await
            .unwrap_err();
        assert_eq!(err.stage, ChainStage::Search);
        assert!(matches!(err.kind, ChainErrorKind::EmptySearchResult));
        assert!(browser.requests().is_empty());
    }

    #[tokio::test]
    async fn malformed_search_text_is_reported() {
        let search = ScriptedTool::new("web_search", vec![Ok(McpToolResult::text("<html>"))]);
        let browser = ScriptedTool::new("browseruse", vec![]);
        let err = chain(search, browser)
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ChainErrorKind::MalformedResult(_)));
    }

    #[tokio::test]
    async fn navigation_error_stops_before_extract() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["https://a.example"]))],
        );
        let browser = ScriptedTool::new(
            "browseruse",
            vec![Ok(McpToolResult::error("page did not load"))],
        );

        let err = chain(search, browser.clone())
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap_err();
        assert_eq!(err.stage, ChainStage::Navigate);
        match err.kind {
            ChainErrorKind::NavigationFailed(message) => assert_eq!(message, "page did not load"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(browser.requests().len(), 1);
    }

    #[tokio::test]
    async fn missing_tab_id_is_a_navigation_failure() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["https://a.example"]))],
        );
        let browser = ScriptedTool::new(
            "browseruse",
            vec![Ok(McpToolResult::text(r#"{"status": "ok"}"#))],
        );
        let err = chain(search, browser.clone())
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap_err();
        assert_eq!(err.stage, ChainStage::Navigate);
        assert!(matches!(err.kind, ChainErrorKind::NavigationFailed(_)));
        assert_eq!(browser.requests().len(), 1);
    }

    #[tokio::test]
    async fn image_only_navigation_is_a_navigation_failure() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["https://a.example"]))],
        );
        let screenshot = McpToolResult {
            content: vec![ContentBlock::Image {
                data: "AAAA".into(),
                mime_type: "image/png".into(),
            }],
            is_error: false,
            metadata: IndexMap::new(),
        };
        let browser = ScriptedTool::new("browseruse", vec![Ok(screenshot)]);

        let err = chain(search, browser.clone())
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap_err();
        assert_eq!(err.stage, ChainStage::Navigate);
        assert!(matches!(err.kind, ChainErrorKind::NavigationFailed(_)));
        assert_eq!(browser.requests().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_during_navigation_stops_the_chain() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["https://a.example"]))],
        );
        let browser = CountingTool::new("browseruse", Behaviour::Hang);
        let catalog = StaticCatalog::default()
            .with(search.clone())
            .with(browser.clone());
        let chain = ToolChain::new(Arc::new(catalog), ChainSettings::default());

        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = chain.execute_chain(&ctx, "q", "g").await.unwrap_err();
        assert_eq!(err.stage, ChainStage::Navigate);
        assert!(matches!(err.kind, ChainErrorKind::Cancelled));
        assert_eq!(search.requests().len(), 1);
        // extract never runs
        assert_eq!(browser.call_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_during_search_skips_the_browser() {
        let search = CountingTool::new("web_search", Behaviour::Hang);
        let browser = ScriptedTool::new("browseruse", vec![]);
        let catalog = StaticCatalog::default()
            .with(search.clone())
            .with(browser.clone());
        let chain = ToolChain::new(Arc::new(catalog), ChainSettings::default());

        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = chain.execute_chain(&ctx, "q", "g").await.unwrap_err();
        assert_eq!(err.stage, ChainStage::Search);
        assert!(matches!(err.kind, ChainErrorKind::Cancelled));
        assert_eq!(search.call_count(), 1);
        assert!(browser.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_browser_tool_fails_navigate_stage() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["https://a.example"]))],
        );
        let catalog = StaticCatalog::default().with(search);
        let err = ToolChain::new(Arc::new(catalog), ChainSettings::default())
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap_err();
        assert_eq!(err.stage, ChainStage::Navigate);
        assert!(matches!(err.kind, ChainErrorKind::NotFound(ref name) if name == "browseruse"));
        assert_eq!(err.to_string(), "navigate stage failed: tool browseruse not found");
    }

    #[tokio::test]
    async fn blank_first_url_fails_selection() {
        let search = ScriptedTool::new(
            "web_search",
            vec![Ok(search_reply(&["", "https://b.example"]))],
        );
        let browser = ScriptedTool::new("browseruse", vec![]);
        let err = chain(search, browser)
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap_err();
        assert_eq!(err.stage, ChainStage::Select);
        assert!(matches!(err.kind, ChainErrorKind::MissingUrl));
    }

    #[tokio::test]
    async fn settings_pick_tool_names_and_limit() {
        let search = ScriptedTool::new("bing", vec![Ok(search_reply(&["https://a.example"]))]);
        let browser = ScriptedTool::new(
            "chromium",
            vec![
                Ok(McpToolResult::text(r#"{"tab_id": "tab-1"}"#)),
                Ok(McpToolResult::text("done")),
            ],
        );
        let catalog = StaticCatalog::default()
            .with(search.clone())
            .with(browser.clone());
        let settings = ChainSettings {
            search_tool: "bing".into(),
            browser_tool: "chromium".into(),
            result_limit: 2,
        };
        let text = ToolChain::new(Arc::new(catalog), settings)
            .execute_chain(&CallContext::new(), "q", "g")
            .await
            .unwrap();
        assert_eq!(text, "done");
        assert_eq!(search.requests()[0].arguments.get_str("query").as_deref(), Some("q"));
        assert_eq!(search.requests()[0].arguments.to_value()["limit"], json!(2));
        assert_eq!(browser.requests()[1].arguments.get_str("tab_id").as_deref(), Some("tab-1"));
    }

    #[test]
    fn tab_id_accepts_known_spellings() {
        assert_eq!(parse_tab_id(r#"{"tabId": 3}"#), Some(json!(3)));
        assert_eq!(parse_tab_id(r#"{"tab_id": "x"}"#), Some(json!("x")));
        assert_eq!(parse_tab_id(r#"{"tab_id": ""}"#), None);
        assert_eq!(parse_tab_id("not json"), None);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Type and optional description of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn new(kind: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            description: description.map(str::to_string),
        }
    }
}

/// Static metadata for one tool. The description is used verbatim when
/// prompting the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDescription {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, Value>,
}

impl McpToolDescription {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: IndexMap::new(),
            required: Vec::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        self.parameters
            .insert(name.into(), ParameterSpec::new(kind, description));
        self
    }

    pub fn with_required_parameter(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.with_parameter(name, kind, description)
    }

    /// Builds a description from a JSON Schema object. Properties without a
    /// `type` are recorded as `any`.
    pub fn from_input_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Self {
        let mut tool = Self::new(name, description);
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (param, prop) in properties {
                let kind = prop.get("type").and_then(Value::as_str).unwrap_or("any");
                let desc = prop.get("description").and_then(Value::as_str);
                tool.parameters
                    .insert(param.clone(), ParameterSpec::new(kind, desc));
            }
        }
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            tool.required = required
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        tool
    }

    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                let mut prop = json!({ "type": spec.kind });
                if let Some(desc) = &spec.description {
                    prop["description"] = json!(desc);
                }
                (name.clone(), prop)
            })
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

/// Arguments of a tool call: either a key/value object or the same data as a
/// serialized string. The receiving tool decides how to interpret either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallArguments {
    Map(Map<String, Value>),
    Raw(String),
}

impl Default for CallArguments {
    fn default() -> Self {
        CallArguments::Map(Map::new())
    }
}

impl CallArguments {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, McpToolError> {
        match self {
            CallArguments::Map(map) => serde_json::from_value(Value::Object(map.clone()))
                .map_err(|err| McpToolError::InvalidInput(format!("invalid arguments: {err}"))),
            CallArguments::Raw(raw) => serde_json::from_str(raw).map_err(|err| {
                McpToolError::InvalidInput(format!("invalid serialized arguments: {err}"))
            }),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self {
            CallArguments::Map(map) => map.get(key).and_then(Value::as_str).map(str::to_string),
            CallArguments::Raw(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|value| value.get(key).and_then(Value::as_str).map(str::to_string)),
        }
    }

    /// JSON form used on the wire. Raw strings that hold a JSON document are
    /// forwarded as that document.
    pub fn to_value(&self) -> Value {
        match self {
            CallArguments::Map(map) => Value::Object(map.clone()),
            CallArguments::Raw(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpCallRequest {
    #[serde(default)]
    pub arguments: CallArguments,
}

impl McpCallRequest {
    pub fn new(arguments: Map<String, Value>) -> Self {
        Self {
            arguments: CallArguments::Map(arguments),
        }
    }

    pub fn raw(arguments: impl Into<String>) -> Self {
        Self {
            arguments: CallArguments::Raw(arguments.into()),
        }
    }

    pub fn from_value(value: Value) -> Self {
        let arguments = match value {
            Value::Object(map) => CallArguments::Map(map),
            Value::String(raw) => CallArguments::Raw(raw),
            Value::Null => CallArguments::default(),
            other => CallArguments::Raw(other.to_string()),
        };
        Self { arguments }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    /// Any block type this runtime does not interpret, such as `audio`.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, Value>,
}

impl McpToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
            metadata: IndexMap::new(),
        }
    }

    /// A reported failure: the call went through but the tool could not do
    /// what was asked.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// All text blocks joined, for error reporting.
    pub fn text_summary(&self) -> String {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            "<no text content>".to_string()
        } else {
            texts.join("\n")
        }
    }
}

#[derive(Debug, Error)]
pub enum McpToolError {
    #[error("tool invocation failed: {0}")]
    Invocation(String),
    #[error("tool rejected input: {0}")]
    InvalidInput(String),
    #[error("tool call cancelled")]
    Cancelled,
}

pub type McpToolResultT = Result<McpToolResult, McpToolError>;

/// Per-request context handed to every tool call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
pub trait McpTool: Send + Sync {
    fn description(&self) -> &McpToolDescription;
    async fn call(&self, ctx: &CallContext, request: McpCallRequest) -> McpToolResultT;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool {0} not found")]
pub struct ToolNotFound(pub String);

/// Read-only view over the constructed tools, used by the planner, the
/// coordinator and the tool chain.
pub trait ToolCatalog: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Arc<dyn McpTool>, ToolNotFound>;
    fn descriptors(&self) -> Vec<McpToolDescription>;
}

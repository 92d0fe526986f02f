use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One entry of a generated plan. `reason` is kept for tracing only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStep {
    pub tool_name: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ordered tool calls; list order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPlan {
    #[serde(default)]
    pub steps: Vec<ToolCallStep>,
}

impl ToolCallPlan {
    pub fn new(steps: Vec<ToolCallStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Parses a model reply. A reply wrapped in one markdown code fence is
    /// unwrapped first.
    pub fn parse(reply: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_code_fence(reply))
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string (`json`, `JSON`, ...) on the opening line
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

//! HTTP surface of the runtime.
//!
//! # Routes
//!
//! - `GET  /health`           - liveness check with the number of loaded tools
//! - `GET  /tools`            - tool descriptors with JSON Schema inputs
//! - `POST /tools/:name/call` - invoke one tool directly
//! - `POST /messages`         - plan and execute a query, `{query}` -> `{result}`
//! - `POST /chain`            - fixed search/navigate/extract, `{query, goal}` -> `{result}`

use std::future::Future;
use std::time::Duration;

use agent_core::{AgentRuntime, RegistryError};
use ai_agent::{CallContext, McpCallRequest, McpToolResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub runtime: AgentRuntime,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(runtime: AgentRuntime, request_timeout: Duration) -> Self {
        Self {
            runtime,
            request_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ChainRequest {
    pub query: String,
    pub goal: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub result: String,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(list_tools_handler))
        .route("/tools/:name/call", post(call_tool_handler))
        .route("/messages", post(messages_handler))
        .route("/chain", post(chain_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Runs `work` with a context that is cancelled once `timeout` elapses.
async fn with_deadline<F, Fut, T>(timeout: Duration, work: F) -> T
where
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = T>,
{
    let ctx = CallContext::new();
    let token = ctx.token().clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        token.cancel();
    });
    let output = work(ctx).await;
    timer.abort();
    output
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "tools": state.runtime.registry().len(),
    }))
}

async fn list_tools_handler(State(state): State<AppState>) -> Json<Value> {
    let tools: Vec<Value> = state
        .runtime
        .tool_descriptions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema(),
            })
        })
        .collect();
    Json(json!({ "tools": tools }))
}

async fn call_tool_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<McpToolResult>, ApiError> {
    let tool = state.runtime.lookup(&name).map_err(|err| match err {
        RegistryError::NotFound(_) => api_error(StatusCode::NOT_FOUND, err.to_string()),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    // Accept either `{"arguments": ...}` or the bare argument object.
    let arguments = match body.map(|Json(value)| value) {
        Some(Value::Object(mut map)) if map.contains_key("arguments") => {
            map.remove("arguments").unwrap_or_default()
        }
        Some(other) => other,
        None => Value::Null,
    };
    let request = McpCallRequest::from_value(arguments);

    let result = with_deadline(state.request_timeout, |ctx| async move {
        tool.call(&ctx, request).await
    })
    .await;
    match result {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            error!(tool = %name, error = %err, "direct tool call failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

async fn messages_handler(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!(query = %request.query, "received query");
    let runtime = state.runtime.clone();
    let outcome = with_deadline(state.request_timeout, |ctx| async move {
        runtime.run(&ctx, &request.query).await
    })
    .await;

    match outcome {
        Ok(outcome) => Ok(Json(MessageResponse {
            result: outcome.answer.unwrap_or_default(),
        })),
        Err(err) => {
            error!(error = %err, "query failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

async fn chain_handler(
    State(state): State<AppState>,
    Json(request): Json<ChainRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!(query = %request.query, goal = %request.goal, "received chain request");
    let runtime = state.runtime.clone();
    let result = with_deadline(state.request_timeout, |ctx| async move {
        runtime.run_chain(&ctx, &request.query, &request.goal).await
    })
    .await;

    match result {
        Ok(result) => Ok(Json(MessageResponse { result })),
        Err(err) => {
            error!(error = %err, "tool chain failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

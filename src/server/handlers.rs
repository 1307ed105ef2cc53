// API handlers module

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::params::RawLoadTestParams;
use super::{ApiError, AppState};
use crate::gateway::HttpChatGateway;
use crate::harness::{request_timeout_for, RunController};
use crate::reporter::LoadTestSummary;

/// 受信チャットリクエスト。未知フィールドは拒否する。
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub message: String,
}

/// チャット応答
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

/// GET /api - liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the LLM Chat API" }))
}

/// POST /api/chat - forward one message to the upstream LLM.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    tracing::info!(chars = request.message.len(), "received chat message");

    let content = state
        .llm
        .complete(&request.message)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(ChatResponse { content }))
}

/// GET /api/load-test - validate parameters, drive one run to
/// completion, and return its summary. Every request gets an isolated
/// controller; concurrent runs do not share state.
pub async fn load_test(
    State(state): State<AppState>,
    params: Result<Query<RawLoadTestParams>, QueryRejection>,
) -> Result<Json<LoadTestSummary>, ApiError> {
    let Query(raw) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let request = raw
        .into_request(state.config.max_users)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let timeout = request_timeout_for(&request, state.config.request_timeout);
    let gateway = HttpChatGateway::new(state.target_url.clone(), timeout)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let controller = RunController::new(request, Arc::new(gateway), state.prompts.clone(), timeout);
    let summary = controller
        .run()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(summary))
}

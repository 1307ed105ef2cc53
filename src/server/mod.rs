// API server module
//
// axum service exposing the health, chat, and load-test endpoints.
// CORS is permissive: the UI is served from a different origin.

pub mod handlers;
pub mod llm;
pub mod params;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::LoadTestError;
use crate::harness::wait_for_shutdown;
use crate::prompts::PromptPool;
use llm::LlmClient;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<LlmClient>,
    pub prompts: Arc<PromptPool>,
    pub target_url: String,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, LoadTestError> {
        let prompts = match &config.prompts_file {
            Some(path) => PromptPool::load_from_file(std::path::Path::new(path))?,
            None => PromptPool::default(),
        };
        let llm = LlmClient::from_config(&config)?;
        let target_url = config.resolved_target_url();
        Ok(Self {
            config: Arc::new(config),
            llm: Arc::new(llm),
            prompts: Arc::new(prompts),
            target_url,
        })
    }
}

/// Errors crossing the API boundary, mapped onto HTTP statuses:
/// validation → 400, upstream chat failure → 502, run-fatal → 500.
/// Per-request load-test failures never surface here; they are data
/// inside the summary.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Assemble the API router with CORS and request tracing layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/load-test", get(handlers::load_test))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Bind and serve the API until the shutdown flag is set. In-flight
/// connections get `shutdown_timeout` seconds to finish after the flag
/// is observed; past that the server stops hard.
pub async fn serve(config: Config, shutdown: Arc<AtomicBool>) -> Result<(), LoadTestError> {
    let addr = format!("{}:{}", config.listen_host, config.listen_port);
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout);
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let flag = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { wait_for_shutdown(&flag).await });

    tokio::select! {
        result = server => result?,
        _ = async {
            wait_for_shutdown(&shutdown).await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!("graceful shutdown timed out; dropping in-flight connections");
            return Err(LoadTestError::ShutdownTimeout);
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

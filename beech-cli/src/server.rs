// beech-cli/src/server.rs

//! HTTP surface of the assistant: `POST /api/chat` plus health and tool
//! listing endpoints.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use beech_core::{
    config::AgentConfig,
    models::transcript::{ChatRequest, ChatResponse},
    tools::executor::AdsToolProvider,
    ChatError, ChatOrchestrator, ProviderRegistry, ToolDefinition,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Read-only state shared by every request.
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Builds providers and tool collaborators from configuration and the
    /// environment.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        info!(
            provider = %config.default_provider,
            model = %config.default_provider_config()?.model_config.model_name,
            "Building chat server state."
        );
        let http_client = reqwest::Client::new();
        let registry = ProviderRegistry::from_config(config, http_client.clone())
            .context("Failed to set up AI providers")?;
        let analysis_provider = registry.default().ok();
        let tools = AdsToolProvider::from_env(config, http_client, analysis_provider)
            .context("Failed to set up tools")?;
        let orchestrator = ChatOrchestrator::from_config(config, &registry, Arc::new(tools))?;
        Ok(Self { orchestrator })
    }
}

pub fn router(state: SharedState) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        addr = %addr,
        tools = state.orchestrator.tool_definitions().len(),
        "Beech chat server listening on http://{}",
        addr
    );
    axum::serve(listener, router(Arc::new(state)))
        .await
        .context("Server terminated unexpectedly")?;
    Ok(())
}

/// `{success:false, error}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

async fn chat(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected malformed chat request.");
        ApiError::bad_request(rejection.body_text())
    })?;

    match state
        .orchestrator
        .respond(&request.message, &request.history)
        .await
    {
        Ok(reply) => Ok(Json(ChatResponse {
            success: true,
            message: reply.message,
            function_calls: reply.function_calls,
            stop_reason: reply.stop_reason,
        })),
        Err(e) => {
            if e.is_client_error() {
                warn!(error = %e, "Chat request rejected.");
            } else {
                error!(error = %e, "Chat turn failed.");
            }
            Err(e.into())
        }
    }
}

async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "tools": state.orchestrator.tool_definitions().len(),
    }))
}

async fn list_tools(State(state): State<SharedState>) -> Json<Vec<ToolDefinition>> {
    Json(state.orchestrator.tool_definitions().to_vec())
}

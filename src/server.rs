//! HTTP adapter — thin transport around the orchestrator.
//!
//! Two routes: `GET /health` and `POST /run-agent`. The adapter only
//! deserialises the request, runs one shift, and serialises the report;
//! classification, memory and planning all live below it. Email delivery
//! belongs to an external adapter — the notify fields are accepted and
//! passed through untouched.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::Orchestrator;
use crate::config::Config;
use crate::error::AppError;
use crate::llm::LlmProvider;
use crate::memory::SiteMemory;
use crate::model::{ServiceRequest, ShiftReport};

/// Shared wiring for request handlers. The memory store is the only
/// mutable resource shared across concurrent invocations.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub memory: Arc<SiteMemory>,
    pub llm: LlmProvider,
}

/// One shift invocation, as posted by schedulers or operators.
#[derive(Debug, Deserialize)]
pub struct ShiftRequest {
    pub srs: Vec<ServiceRequest>,
    #[serde(default)]
    pub shift_id: Option<String>,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub email_to: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run-agent", post(run_agent))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_agent(
    State(state): State<AppState>,
    Json(req): Json<ShiftRequest>,
) -> Json<ShiftReport> {
    if req.notify_email || req.email_to.is_some() {
        debug!("email delivery is an external adapter's concern; notify fields ignored");
    }

    let orchestrator =
        Orchestrator::from_config(&state.config, state.memory.clone(), state.llm.clone());
    let report = orchestrator.run(req.shift_id, &req.srs).await;
    Json(report)
}

/// Bind and serve until `shutdown` fires.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<(), AppError> {
    let bind = state.config.http.bind.clone();
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|e| AppError::Config(format!("http bind failed on {bind}: {e}")))?;
    info!(%bind, "http adapter listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(AppError::Io)
}

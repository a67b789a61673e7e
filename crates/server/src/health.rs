use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use scholar_agent::SessionStore;
use scholar_core::config::LlmProvider;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    sessions: Arc<SessionStore>,
    provider: LlmProvider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub active_sessions: usize,
    pub llm_provider: &'static str,
    pub checked_at: String,
}

pub fn router(sessions: Arc<SessionStore>, provider: LlmProvider) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { sessions, provider })
}

/// Liveness only; the completion endpoint is not probed.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let active_sessions = state.sessions.len().await;

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "scholar-server runtime initialized".to_string(),
        },
        active_sessions,
        llm_provider: state.provider.as_str(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

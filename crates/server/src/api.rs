use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use scholar_agent::{
    AgentResponse, CapabilityError, CapabilityRegistry, SessionError, SessionStore,
};
use scholar_channel::{
    blocks::{help_message, SESSION_CLEARED_TEXT},
    parse_control_command, ControlCommand,
};
use scholar_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    sessions: Arc<SessionStore>,
    tools: Arc<CapabilityRegistry>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ToolView {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// `InterfaceError` rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ApiErrorBody {
            error: self.0.user_message(),
            detail: self.0.detail().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(sessions: Arc<SessionStore>) -> Router {
    let tools = Arc::new(sessions.registry_template());
    Router::new()
        .route("/api/messages", post(post_message))
        .route("/api/sessions/{session_id}", delete(reset_session))
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(invoke_tool))
        .with_state(ApiState { sessions, tools })
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

fn control_response(content: String) -> AgentResponse {
    AgentResponse { content, citations: Vec::new(), functions_invoked: Vec::new() }
}

async fn post_message(
    State(state): State<ApiState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let correlation_id = correlation_id();
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(ApplicationError::InvalidRequest(SessionError::EmptySessionId.to_string())
            .into_interface(correlation_id)
            .into());
    }
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApplicationError::InvalidRequest("text must not be empty".to_string())
            .into_interface(correlation_id)
            .into());
    }

    info!(
        event_name = "server.message.received",
        correlation_id = %correlation_id,
        session_id = %session_id,
        "message accepted"
    );

    match parse_control_command(text) {
        Some(ControlCommand::Clear) => {
            state.sessions.reset(session_id).await;
            Ok(Json(control_response(SESSION_CLEARED_TEXT.to_string())))
        }
        Some(ControlCommand::Help) => Ok(Json(control_response(help_message().plain_text()))),
        None => state
            .sessions
            .process_message(session_id, text)
            .await
            .map(Json)
            .map_err(|error| {
                ApiError::from(
                    ApplicationError::InvalidRequest(error.to_string())
                        .into_interface(correlation_id),
                )
            }),
    }
}

async fn reset_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    let reset = state.sessions.reset(&session_id).await;
    Json(json!({ "reset": reset }))
}

async fn list_tools(State(state): State<ApiState>) -> Json<Vec<ToolView>> {
    let tools = state
        .tools
        .descriptors()
        .into_iter()
        .map(|descriptor| ToolView {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
        })
        .collect();
    Json(tools)
}

async fn invoke_tool(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id();
    let Value::Object(parameters) = body else {
        return Err(ApplicationError::InvalidRequest(
            "tool arguments must be a JSON object".to_string(),
        )
        .into_interface(correlation_id)
        .into());
    };

    match state.tools.try_invoke(&name, parameters).await {
        Ok(result) => Ok((StatusCode::OK, Json(json!({ "result": result }))).into_response()),
        Err(CapabilityError::NotFound(missing)) => {
            Err(ApplicationError::NotFound(format!("tool `{missing}`"))
                .into_interface(correlation_id)
                .into())
        }
        Err(error) => {
            warn!(
                event_name = "server.tool.failed",
                correlation_id = %correlation_id,
                tool = %name,
                error = %error,
                "tool invocation failed"
            );
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": error.to_string() })))
                .into_response())
        }
    }
}

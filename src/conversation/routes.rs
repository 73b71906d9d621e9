//! REST endpoints for the chat widget.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::manager::SessionManager;
use crate::error::SessionError;

/// Shared state for chat routes.
#[derive(Clone)]
pub struct ChatRouteState {
    pub manager: Arc<SessionManager>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    text: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::EmptyInput => StatusCode::BAD_REQUEST,
            SessionError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Session error: {}", self);
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// POST /api/sessions
///
/// Opens a conversation and returns its id with the opening question.
async fn open_session(State(state): State<ChatRouteState>) -> impl IntoResponse {
    let (session_id, messages) = state.manager.open().await;
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session_id,
            "messages": messages,
        })),
    )
}

/// GET /api/sessions/{id}
async fn get_session(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, SessionError> {
    Ok(Json(state.manager.snapshot(id).await?))
}

/// POST /api/sessions/{id}/messages
///
/// Body: `{"text": "..."}`. Blank text is a 400.
async fn post_message(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageBody>,
) -> Result<impl IntoResponse, SessionError> {
    Ok(Json(state.manager.handle(id, &body.text).await?))
}

/// POST /api/sessions/{id}/reset
async fn reset_session(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, SessionError> {
    Ok(Json(state.manager.reset(id).await?))
}

/// POST /api/sessions/{id}/handoff
///
/// Retries a hand-off that failed earlier.
async fn retry_handoff(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, SessionError> {
    Ok(Json(state.manager.retry_handoff(id).await?))
}

/// DELETE /api/sessions/{id}
async fn close_session(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, SessionError> {
    state.manager.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> &'static str {
    "ok"
}

/// Build the chat REST routes.
pub fn chat_routes(state: ChatRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(open_session))
        .route("/api/sessions/{id}", get(get_session).delete(close_session))
        .route("/api/sessions/{id}/messages", post(post_message))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/handoff", post(retry_handoff))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateSessionResponse, ErrorResponse, QueuedResponse, SessionListResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{SessionError, SessionEvent, Snapshot};
use crate::state_machine::Event;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        // Speech and UI events from the browser
        .route("/api/sessions/:id/events", post(send_event))
        // Snapshot and speech command stream
        .route("/api/sessions/:id/stream", get(stream_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let handle = state.sessions.create().await;
    tracing::info!(session_id = %handle.session_id, "Created session");

    Json(CreateSessionResponse {
        snapshot: handle.snapshot(),
        session_id: handle.session_id,
    })
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.sessions.list().await,
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Snapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.remove(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Events and Streaming
// ============================================================

async fn send_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(event): Json<Event>,
) -> Result<Json<QueuedResponse>, AppError> {
    tracing::debug!(session_id = %id, event = event.name(), "Received event");
    state.sessions.send_event(&id, event).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before reading the snapshot so nothing falls in between
    let broadcast_rx = state.sessions.subscribe(&id).await?;
    let snapshot = state.sessions.get(&id).await?.snapshot();

    Ok(sse_stream(SessionEvent::Init { snapshot }, broadcast_rx))
}

async fn get_version(State(state): State<AppState>) -> String {
    format!(
        "trivaso {} ({} items)",
        env!("CARGO_PKG_VERSION"),
        state.sessions.content().item_count()
    )
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

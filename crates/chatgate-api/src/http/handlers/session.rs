//! Session lifecycle HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/sessions              - Create a session, wait for its pairing result
//! - GET    /api/v1/sessions              - List registered sessions
//! - GET    /api/v1/sessions/{id}         - Existence and status of one session
//! - DELETE /api/v1/sessions/{id}         - Remove a session and its credentials
//! - GET    /api/v1/sessions/{id}/exists  - Ask the session whether a recipient exists

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatgate_core::jid::format_destination;
use chatgate_types::session::{PairingResult, SessionStatus};

use super::validate_session_id;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub id: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// When the current connection was established.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub target: String,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub target: String,
    pub exists: bool,
}

/// POST /api/v1/sessions - Create a session.
///
/// Blocks until the first pairing result: a QR artifact to scan, or
/// `connected` when stored credentials were accepted.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PairingResult>>), AppError> {
    let clock = RequestClock::start();

    let result = state.sessions.create_session(&body.id).await?;
    if let PairingResult::Failed { message } = &result {
        return Err(AppError::Pairing(message.clone()));
    }

    let resp = clock
        .success(result)
        .with_link("self", &format!("/api/v1/sessions/{}", body.id));
    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/sessions - List registered sessions with their status.
pub async fn list_sessions(State(state): State<AppState>) -> Json<ApiResponse<Vec<SessionSummary>>> {
    let clock = RequestClock::start();
    let sessions = state
        .sessions
        .list()
        .into_iter()
        .map(|(id, status)| SessionSummary { id, status })
        .collect();
    Json(clock.success(sessions))
}

/// GET /api/v1/sessions/{id} - Whether a session is registered, and its status.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionDetail>>, AppError> {
    let clock = RequestClock::start();
    validate_session_id(&id)?;

    let status = state.sessions.status(&id);
    let connected_at = state.sessions.get(&id).map(|handle| handle.connected_at());
    let detail = SessionDetail {
        exists: status.is_some(),
        status,
        connected_at,
        id,
    };
    Ok(Json(clock.success(detail)))
}

/// DELETE /api/v1/sessions/{id} - Remove a session. Idempotent.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let clock = RequestClock::start();
    validate_session_id(&id)?;

    state.sessions.delete(&id).await;
    Ok(Json(clock.success(serde_json::json!({ "id": id, "deleted": true }))))
}

/// GET /api/v1/sessions/{id}/exists?target=..&is_group=.. - Recipient existence.
pub async fn check_exists(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExistsQuery>,
) -> Result<Json<ApiResponse<ExistsResponse>>, AppError> {
    let clock = RequestClock::start();
    validate_session_id(&id)?;

    let target = format_destination(&query.target, query.is_group);
    let exists = state
        .sessions
        .check_exists(&id, &target, query.is_group)
        .await?;
    Ok(Json(clock.success(ExistsResponse { target, exists })))
}

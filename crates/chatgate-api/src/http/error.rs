//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use chatgate_types::error::{DispatchError, RepositoryError, SessionError};

use super::response::{ApiErrorDetail, ApiMeta, ApiResponse};

/// User-visible message for any failed send; the cause is only logged.
pub const SEND_FAILED_MESSAGE: &str = "Failed to send the message.";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Session lifecycle errors.
    Session(SessionError),
    /// A send failed. Deliberately carries no cause.
    SendFailed,
    /// The pairing flow produced a failure result.
    Pairing(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<DispatchError> for AppError {
    fn from(_: DispatchError) -> Self {
        AppError::SendFailed
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Session(e) => match e {
                SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", e.to_string()),
                SessionError::AlreadyExists(_) => (StatusCode::CONFLICT, "SESSION_EXISTS", e.to_string()),
                SessionError::InvalidId(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
                SessionError::Abandoned(_) => (StatusCode::CONFLICT, "SESSION_REMOVED", e.to_string()),
                SessionError::PairingTimeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "PAIRING_TIMEOUT", e.to_string())
                }
                SessionError::PairingAborted(_) => {
                    (StatusCode::BAD_GATEWAY, "PAIRING_ABORTED", e.to_string())
                }
                SessionError::Transport(t) if t.is_connection_closed() => {
                    (StatusCode::SERVICE_UNAVAILABLE, "CONNECTION_CLOSED", e.to_string())
                }
                SessionError::Transport(_) => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR", e.to_string()),
                SessionError::Credentials(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CREDENTIALS_ERROR", e.to_string())
                }
            },
            AppError::SendFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SEND_FAILED",
                SEND_FAILED_MESSAGE.to_string(),
            ),
            AppError::Pairing(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "PAIRING_FAILED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body: ApiResponse<()> = ApiResponse {
            data: None,
            meta: ApiMeta::new(Uuid::now_v7().to_string(), 0),
            errors: vec![ApiErrorDetail {
                code: code.to_string(),
                message,
            }],
            links: Default::default(),
        };

        (status, Json(body)).into_response()
    }
}

//! Message HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/sessions/{id}/messages - Send a message through a session
//! - GET  /api/v1/messages               - The sent-message log

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use chatgate_core::jid::format_destination;
use chatgate_core::repository::message::MessageLog;
use chatgate_types::error::SessionError;
use chatgate_types::message::{MessageContent, MessageRecord, SendReceipt};

use super::validate_session_id;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

/// Body of a send request.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Phone number or group id; formatted into a destination identifier.
    pub receiver: String,
    #[serde(default)]
    pub is_group: bool,
    pub message: WireMessage,
    /// Overrides the configured send delay.
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

/// Message shapes accepted on the wire.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    Document {
        document: MediaRef,
        #[serde(default)]
        mimetype: Option<String>,
        #[serde(default, rename = "fileName")]
        file_name: Option<String>,
        #[serde(default)]
        caption: Option<String>,
    },
    Image {
        image: MediaRef,
        #[serde(default)]
        caption: Option<String>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct MediaRef {
    pub url: String,
}

impl From<WireMessage> for MessageContent {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Text { text } => MessageContent::Text { body: text },
            WireMessage::Document {
                document,
                mimetype,
                file_name,
                caption,
            } => MessageContent::Document {
                url: document.url,
                mimetype,
                file_name,
                caption,
            },
            WireMessage::Image { image, caption } => MessageContent::Image {
                url: image.url,
                caption,
            },
        }
    }
}

/// POST /api/v1/sessions/{id}/messages - Send a message.
///
/// Any dispatch failure answers the opaque `SEND_FAILED` error.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<SendReceipt>>, AppError> {
    let clock = RequestClock::start();
    validate_session_id(&id)?;
    if body.receiver.trim().is_empty() {
        return Err(AppError::Validation("receiver must not be empty".to_string()));
    }

    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| SessionError::NotFound(id.clone()))?;

    let destination = format_destination(&body.receiver, body.is_group);
    let delay = Duration::from_millis(
        body.delay_ms
            .unwrap_or(state.config.dispatch.default_delay_ms),
    );

    let receipt = state
        .dispatcher
        .send(&session, &destination, body.message.into(), delay)
        .await?;
    Ok(Json(clock.success(receipt)))
}

/// GET /api/v1/messages - Every logged message in send order.
pub async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MessageRecord>>>, AppError> {
    let clock = RequestClock::start();
    let records = state.dispatcher.log().list_all().await?;
    Ok(Json(clock.success(records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> MessageContent {
        serde_json::from_value::<WireMessage>(body).unwrap().into()
    }

    #[test]
    fn wire_text() {
        assert_eq!(
            parse(serde_json::json!({"text": "hello"})),
            MessageContent::Text { body: "hello".into() }
        );
    }

    #[test]
    fn wire_document_with_file_name() {
        let content = parse(serde_json::json!({
            "document": {"url": "https://cdn.example.com/r.pdf"},
            "mimetype": "application/pdf",
            "fileName": "r.pdf"
        }));
        assert_eq!(
            content,
            MessageContent::Document {
                url: "https://cdn.example.com/r.pdf".into(),
                mimetype: Some("application/pdf".into()),
                file_name: Some("r.pdf".into()),
                caption: None,
            }
        );
    }

    #[test]
    fn wire_document_keeps_caption_for_the_log() {
        let content = parse(serde_json::json!({
            "document": {"url": "https://cdn.example.com/r.pdf"},
            "caption": "monthly report"
        }));
        assert_eq!(content.log_text(), "monthly report");
        assert!(matches!(content, MessageContent::Document { mimetype: None, .. }));
    }

    #[test]
    fn wire_image_caption_optional() {
        let content = parse(serde_json::json!({"image": {"url": "https://cdn.example.com/a.png"}}));
        assert_eq!(
            content,
            MessageContent::Image {
                url: "https://cdn.example.com/a.png".into(),
                caption: None,
            }
        );
    }

    #[test]
    fn unknown_shape_is_rejected() {
        assert!(serde_json::from_value::<WireMessage>(serde_json::json!({"audio": {}})).is_err());
    }

    #[test]
    fn request_defaults() {
        let req: SendMessageRequest = serde_json::from_value(serde_json::json!({
            "receiver": "+55 34 9999-0000",
            "message": {"text": "hi"}
        }))
        .unwrap();
        assert!(!req.is_group);
        assert_eq!(req.delay_ms, None);
    }
}

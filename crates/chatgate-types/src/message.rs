//! Outbound message types.
//!
//! `MessageContent` is what a caller asks to send; `OutboundPayload` is what
//! the transport actually receives once remote media has been fetched.
//! `MessageRecord` is the append-only log entry written after a successful send.

use serde::{Deserialize, Serialize};

/// Default mimetype for documents sent without one.
pub const DEFAULT_DOCUMENT_MIMETYPE: &str = "application/octet-stream";

/// Default file name for documents sent without one.
pub const DEFAULT_DOCUMENT_FILE_NAME: &str = "file";

/// A message a caller wants to send through a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Document {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mimetype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        /// Recorded in the message log only; documents are sent without one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl MessageContent {
    /// Remote URL that must be fetched before sending, if any.
    pub fn media_url(&self) -> Option<&str> {
        match self {
            MessageContent::Text { .. } => None,
            MessageContent::Document { url, .. } | MessageContent::Image { url, .. } => Some(url),
        }
    }

    /// Text recorded in the message log: the body, the caption, or empty.
    pub fn log_text(&self) -> &str {
        match self {
            MessageContent::Text { body } => body,
            MessageContent::Image { caption, .. } | MessageContent::Document { caption, .. } => {
                caption.as_deref().unwrap_or("")
            }
        }
    }
}

/// The payload handed to the transport's `send`.
///
/// Media variants carry the fetched bytes in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    Text {
        text: String,
    },
    Document {
        data: Vec<u8>,
        mimetype: String,
        file_name: String,
    },
    Image {
        data: Vec<u8>,
        caption: String,
    },
}

/// What the transport returns for an accepted send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendReceipt {
    /// Transport-assigned message id.
    pub message_id: String,
    /// Destination the message was sent to.
    pub destination: String,
}

/// A message log entry before it has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessageRecord {
    /// Sender phone/id from the session's authenticated identity (may be empty).
    pub phone: String,
    /// Sender display name (may be empty).
    pub name: String,
    /// Destination identifier.
    pub receiver: String,
    /// Text body or caption, empty for pure media.
    pub text: String,
    /// Source URL of fetched media, empty for pure text.
    pub link: String,
    /// Send time, already localized and formatted.
    pub timestamp: String,
}

/// A persisted message log entry. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub phone: String,
    pub name: String,
    pub receiver: String,
    pub text: String,
    pub link: String,
    pub timestamp: String,
}

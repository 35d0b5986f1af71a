//! Bridge wire format.
//!
//! Request/response bodies of the bridge HTTP API and the mapping from its
//! SSE event names (`creds`, `qr`, `open`, `close`) to [`TransportEvent`]s.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use chatgate_types::error::TransportError;
use chatgate_types::message::OutboundPayload;
use chatgate_types::transport::{
    ConnectionIdentity, DisconnectReason, ProtocolVersion, TransportEvent,
};

#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    pub version: [u32; 3],
}

impl From<VersionResponse> for ProtocolVersion {
    fn from(response: VersionResponse) -> Self {
        ProtocolVersion(response.version)
    }
}

#[derive(Debug, Serialize)]
pub struct OpenRequest<'a> {
    pub credentials: Option<&'a serde_json::Value>,
    pub version: [u32; 3],
}

/// Identifies one bridge-side connection; later requests are scoped to it.
#[derive(Debug, Deserialize)]
pub struct OpenResponse {
    pub connection_id: String,
}

/// Outbound payload with media bytes base64-encoded.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WirePayload {
    Text {
        text: String,
    },
    Document {
        data: String,
        mimetype: String,
        file_name: String,
    },
    Image {
        data: String,
        caption: String,
    },
}

impl From<OutboundPayload> for WirePayload {
    fn from(payload: OutboundPayload) -> Self {
        match payload {
            OutboundPayload::Text { text } => WirePayload::Text { text },
            OutboundPayload::Document {
                data,
                mimetype,
                file_name,
            } => WirePayload::Document {
                data: STANDARD.encode(data),
                mimetype,
                file_name,
            },
            OutboundPayload::Image { data, caption } => WirePayload::Image {
                data: STANDARD.encode(data),
                caption,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub payload: WirePayload,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct LookupRequest<'a> {
    pub jid: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct GroupResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrEvent {
    code: String,
}

#[derive(Debug, Deserialize)]
struct CloseEvent {
    #[serde(default)]
    status_code: Option<u16>,
}

/// Map one SSE message to a transport event.
///
/// Unknown event names yield `Ok(None)` so newer bridges can add events.
pub fn parse_event(event: &str, data: &str) -> Result<Option<TransportEvent>, TransportError> {
    let invalid = |e: serde_json::Error| TransportError::Protocol(format!("invalid '{event}' event: {e}"));
    let parsed = match event {
        "creds" => TransportEvent::CredentialsUpdated(serde_json::from_str(data).map_err(invalid)?),
        "qr" => {
            let qr: QrEvent = serde_json::from_str(data).map_err(invalid)?;
            TransportEvent::PairingCode(qr.code)
        }
        "open" => {
            let identity: ConnectionIdentity = serde_json::from_str(data).map_err(invalid)?;
            TransportEvent::Open(identity)
        }
        "close" => {
            let close: CloseEvent = serde_json::from_str(data).map_err(invalid)?;
            TransportEvent::Closed(DisconnectReason::from_status(close.status_code))
        }
        _ => return Ok(None),
    };
    Ok(Some(parsed))
}

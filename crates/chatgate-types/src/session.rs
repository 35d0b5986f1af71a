//! Session domain types.
//!
//! A session is one managed, independently authenticated chat connection,
//! keyed by a caller-chosen id. These types describe its lifecycle state and
//! the one-shot result handed to the caller that created it.

use serde::{Deserialize, Serialize};

/// Prefix of the per-session credential directory (`auth_<id>`).
pub const AUTH_DIR_PREFIX: &str = "auth_";

/// Maximum accepted length of a session id.
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Lifecycle state of a session's connection.
///
/// ```text
/// Connecting --pairing code--> AwaitingPairing --open--> Open
///     |                                                   |
///     +--------------------------open---------------------+
/// any --closed--> Closed (terminal for this connection)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    AwaitingPairing,
    Open,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::AwaitingPairing => write!(f, "awaiting_pairing"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Externally visible status of a registry entry.
///
/// `Reconnecting` covers the window where the id is reserved (backoff or
/// handshake in flight) but no live connection is bound to it yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Reconnecting,
    Connecting,
    AwaitingPairing,
    Open,
}

impl From<SessionState> for SessionStatus {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Connecting => SessionStatus::Connecting,
            SessionState::AwaitingPairing => SessionStatus::AwaitingPairing,
            SessionState::Open => SessionStatus::Open,
            // A closed connection whose entry is still present is waiting to be replaced.
            SessionState::Closed => SessionStatus::Reconnecting,
        }
    }
}

/// Image-encodable rendering of a pairing code, ready for an end user to scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairingArtifact {
    /// `data:` URL carrying the encoded image.
    pub data_url: String,
}

/// The one-shot result delivered to the caller that created a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PairingResult {
    /// A pairing code was issued and rendered; the caller should display it.
    QrReceived { artifact: PairingArtifact },
    /// The session authenticated without (further) pairing.
    Connected { session_id: String },
    /// The pairing flow could not produce a result.
    Failed { message: String },
}

/// Directory name holding the credentials of `session_id`.
pub fn auth_dir_name(session_id: &str) -> String {
    format!("{AUTH_DIR_PREFIX}{session_id}")
}

/// Extract the session id from a credential directory name, if it follows
/// the `auth_<id>` convention.
pub fn session_id_from_dir_name(name: &str) -> Option<&str> {
    name.strip_prefix(AUTH_DIR_PREFIX)
        .filter(|id| is_valid_session_id(id))
}

/// Session ids become directory names, so only `[A-Za-z0-9_-]` is accepted.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_dir_name_roundtrips_through_parser() {
        let dir = auth_dir_name("sales-01");
        assert_eq!(dir, "auth_sales-01");
        assert_eq!(session_id_from_dir_name(&dir), Some("sales-01"));
    }

    #[test]
    fn dir_names_without_prefix_are_ignored() {
        assert_eq!(session_id_from_dir_name("sales-01"), None);
        assert_eq!(session_id_from_dir_name("auth_"), None);
        assert_eq!(session_id_from_dir_name("auth_../etc"), None);
    }

    #[test]
    fn session_id_validation() {
        assert!(is_valid_session_id("a"));
        assert!(is_valid_session_id("Store_2-b"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("has space"));
        assert!(!is_valid_session_id("../escape"));
        assert!(!is_valid_session_id(&"x".repeat(MAX_SESSION_ID_LEN + 1)));
    }

    #[test]
    fn pairing_result_serializes_with_code_tag() {
        let result = PairingResult::QrReceived {
            artifact: PairingArtifact {
                data_url: "data:image/svg+xml;base64,AAAA".to_string(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["code"], "qr_received");
        assert_eq!(json["artifact"]["data_url"], "data:image/svg+xml;base64,AAAA");
    }

    #[test]
    fn closed_state_reports_as_reconnecting() {
        assert_eq!(SessionStatus::from(SessionState::Closed), SessionStatus::Reconnecting);
        assert_eq!(SessionStatus::from(SessionState::Open), SessionStatus::Open);
        assert_eq!(SessionState::AwaitingPairing.to_string(), "awaiting_pairing");
    }
}

//! Transport lifecycle types.
//!
//! The chat transport (handshake, encryption, framing) lives outside this
//! repository. The gateway only sees the events it emits and the handful of
//! operations it exposes; these are the types on that boundary.

use serde::{Deserialize, Serialize};

/// Protocol version advertised by the transport, e.g. `[2, 3000, 1015901307]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolVersion(pub [u32; 3]);

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

/// Authenticated identity of an open connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectionIdentity {
    /// Account id / phone in destination-identifier form.
    pub id: String,
    /// Display name, when the transport knows it.
    #[serde(default)]
    pub name: Option<String>,
}

/// Group metadata returned by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GroupMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Result of a registration lookup for an individual identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationLookup {
    pub jid: String,
    pub exists: bool,
}

/// Why a connection closed.
///
/// Only [`DisconnectReason::LoggedOut`] invalidates stored credentials; every
/// other reason is recoverable by reconnecting with the same credentials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    LoggedOut,
    ConnectionLost,
    MultideviceMismatch,
    ConnectionClosed,
    ConnectionReplaced,
    BadSession,
    UnavailableService,
    RestartRequired,
    Other(u16),
    Unknown,
}

impl DisconnectReason {
    /// Map a transport status code to a disconnect reason.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(401) => DisconnectReason::LoggedOut,
            Some(408) => DisconnectReason::ConnectionLost,
            Some(411) => DisconnectReason::MultideviceMismatch,
            Some(428) => DisconnectReason::ConnectionClosed,
            Some(440) => DisconnectReason::ConnectionReplaced,
            Some(500) => DisconnectReason::BadSession,
            Some(503) => DisconnectReason::UnavailableService,
            Some(515) => DisconnectReason::RestartRequired,
            Some(other) => DisconnectReason::Other(other),
            None => DisconnectReason::Unknown,
        }
    }

    /// Whether this closure invalidates the stored credentials.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DisconnectReason::LoggedOut)
    }
}

/// A lifecycle event emitted by one transport connection.
///
/// Events from a single connection arrive in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The transport's credentials changed and must be persisted.
    CredentialsUpdated(serde_json::Value),
    /// A pairing code was issued (a new one is issued if the previous expires).
    PairingCode(String),
    /// The connection authenticated and is usable.
    Open(ConnectionIdentity),
    /// The connection closed.
    Closed(DisconnectReason),
}

//! Transport traits: the boundary to the external chat-protocol implementation.
//!
//! A [`TransportConnector`] opens one connection per session and hands back the
//! connection handle together with the receiving end of its lifecycle event
//! stream. The gateway never sees handshakes, encryption, or framing.

use tokio::sync::mpsc;

use chatgate_types::error::TransportError;
use chatgate_types::message::{OutboundPayload, SendReceipt};
use chatgate_types::transport::{
    ConnectionIdentity, GroupMetadata, ProtocolVersion, RegistrationLookup, TransportEvent,
};

/// Everything needed to open a connection for one session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub session_id: String,
    /// Previously persisted credentials; `None` starts a fresh pairing.
    pub credentials: Option<serde_json::Value>,
    pub version: ProtocolVersion,
}

/// A live connection owned by one session's supervisor.
pub trait TransportConnection: Send + Sync + 'static {
    /// Current authenticated identity, if the connection has one.
    fn identity(&self) -> Option<ConnectionIdentity>;

    /// Send a payload to a destination identifier.
    fn send(
        &self,
        destination: &str,
        payload: OutboundPayload,
    ) -> impl std::future::Future<Output = Result<SendReceipt, TransportError>> + Send;

    /// Look up whether an individual identifier is registered.
    fn lookup(
        &self,
        jid: &str,
    ) -> impl std::future::Future<Output = Result<RegistrationLookup, TransportError>> + Send;

    /// Fetch metadata of a group identifier.
    fn group_metadata(
        &self,
        jid: &str,
    ) -> impl std::future::Future<Output = Result<GroupMetadata, TransportError>> + Send;

    /// Close the connection without logging out. Idempotent.
    fn close(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// Opens transport connections.
pub trait TransportConnector: Send + Sync + 'static {
    type Connection: TransportConnection;

    /// Latest protocol version the transport should speak.
    fn latest_version(
        &self,
    ) -> impl std::future::Future<Output = Result<ProtocolVersion, TransportError>> + Send;

    /// Open a connection. Events for it arrive on the returned receiver in
    /// emission order; the stream ending means the connection is gone.
    fn connect(
        &self,
        request: ConnectRequest,
    ) -> impl std::future::Future<
        Output = Result<(Self::Connection, mpsc::Receiver<TransportEvent>), TransportError>,
    > + Send;
}

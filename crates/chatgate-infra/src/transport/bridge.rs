//! HTTP/SSE client for the external transport bridge.
//!
//! `BridgeConnector` opens one bridge-side connection per session and
//! subscribes to its Server-Sent Events stream. A background pump task turns
//! SSE messages into [`TransportEvent`]s on an mpsc channel, preserving
//! emission order. When the SSE stream ends or fails the channel closes,
//! which the session supervisor treats as a lost connection.
//!
//! Opening a connection returns a bridge-assigned connection id. Every later
//! request, including the final DELETE, is addressed to that id, so closing
//! a stale connection never tears down its replacement for the same session.
//!
//! The optional bearer token is wrapped in [`secrecy::SecretString`] and only
//! exposed when building request headers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Method;
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chatgate_core::transport::{ConnectRequest, TransportConnection, TransportConnector};
use chatgate_types::config::TransportConfig;
use chatgate_types::error::TransportError;
use chatgate_types::message::{OutboundPayload, SendReceipt};
use chatgate_types::transport::{
    ConnectionIdentity, GroupMetadata, ProtocolVersion, RegistrationLookup, TransportEvent,
};

use super::wire::{
    GroupResponse, LookupRequest, LookupResponse, OpenRequest, OpenResponse, SendRequest,
    SendResponse,
    VersionResponse, parse_event,
};

/// Capacity of each connection's event channel.
const EVENT_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// HTTP plumbing
// ---------------------------------------------------------------------------

struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    request_timeout: Duration,
}

impl BridgeClient {
    /// Request without a timeout (used for the long-lived event stream).
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Request bounded by the configured timeout.
    fn call(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.request(method, path).timeout(self.request_timeout)
    }
}

fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() {
        TransportError::Unavailable(e.to_string())
    } else {
        TransportError::Protocol(e.to_string())
    }
}

/// Map a non-success status to a [`TransportError`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == TransportError::CONNECTION_CLOSED_STATUS {
        return Err(TransportError::ConnectionClosed);
    }
    let message = response.text().await.unwrap_or_default();
    Err(TransportError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    check(response)
        .await?
        .json()
        .await
        .map_err(|e| TransportError::Protocol(format!("invalid bridge response: {e}")))
}

// ---------------------------------------------------------------------------
// BridgeConnector
// ---------------------------------------------------------------------------

/// Opens session connections on the transport bridge.
#[derive(Clone)]
pub struct BridgeConnector {
    client: Arc<BridgeClient>,
}

impl BridgeConnector {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<SecretString>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client: Arc::new(BridgeClient {
                http,
                base_url,
                token,
                request_timeout,
            }),
        })
    }

    /// Build from config, reading the token from the env var it names.
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|token| !token.is_empty())
            .map(SecretString::from);
        Self::new(
            config.bridge_url.clone(),
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

impl TransportConnector for BridgeConnector {
    type Connection = BridgeConnection;

    async fn latest_version(&self) -> Result<ProtocolVersion, TransportError> {
        let response = self
            .client
            .call(Method::GET, "/v1/version")
            .send()
            .await
            .map_err(request_error)?;
        let version: VersionResponse = read_json(response).await?;
        Ok(version.into())
    }

    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<(BridgeConnection, mpsc::Receiver<TransportEvent>), TransportError> {
        let open_path = format!("/v1/connections/{}", request.session_id);
        let body = OpenRequest {
            credentials: request.credentials.as_ref(),
            version: request.version.0,
        };
        let response = self
            .client
            .call(Method::POST, &open_path)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let opened: OpenResponse = read_json(response).await?;
        let base_path = format!("{open_path}/{}", opened.connection_id);

        let source = EventSource::new(
            self.client
                .request(Method::GET, &format!("{base_path}/events")),
        )
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let state = Arc::new(ConnectionState {
            client: Arc::clone(&self.client),
            session_id: request.session_id,
            connection_id: opened.connection_id,
            base_path,
            identity: RwLock::new(None),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump_events(source, tx, Arc::clone(&state)));

        debug!(session_id = %state.session_id, connection_id = %state.connection_id, "Bridge connection opened");
        Ok((BridgeConnection { state }, rx))
    }
}

// ---------------------------------------------------------------------------
// BridgeConnection
// ---------------------------------------------------------------------------

struct ConnectionState {
    client: Arc<BridgeClient>,
    session_id: String,
    connection_id: String,
    base_path: String,
    identity: RwLock<Option<ConnectionIdentity>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl ConnectionState {
    fn set_identity(&self, identity: ConnectionIdentity) {
        if let Ok(mut current) = self.identity.write() {
            *current = Some(identity);
        }
    }
}

/// One session's connection on the bridge.
pub struct BridgeConnection {
    state: Arc<ConnectionState>,
}

impl BridgeConnection {
    fn path(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.state.base_path)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.state.closed.load(Ordering::SeqCst) {
            Err(TransportError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

impl TransportConnection for BridgeConnection {
    fn identity(&self) -> Option<ConnectionIdentity> {
        self.state
            .identity
            .read()
            .ok()
            .and_then(|identity| identity.clone())
    }

    async fn send(
        &self,
        destination: &str,
        payload: OutboundPayload,
    ) -> Result<SendReceipt, TransportError> {
        self.ensure_open()?;
        let body = SendRequest {
            to: destination,
            payload: payload.into(),
        };
        let response = self
            .state
            .client
            .call(Method::POST, &self.path("messages"))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let sent: SendResponse = read_json(response).await?;
        Ok(SendReceipt {
            message_id: sent.id,
            destination: destination.to_string(),
        })
    }

    async fn lookup(&self, jid: &str) -> Result<RegistrationLookup, TransportError> {
        self.ensure_open()?;
        let response = self
            .state
            .client
            .call(Method::POST, &self.path("lookup"))
            .json(&LookupRequest { jid })
            .send()
            .await
            .map_err(request_error)?;
        let lookup: LookupResponse = read_json(response).await?;
        Ok(RegistrationLookup {
            jid: jid.to_string(),
            exists: lookup.exists,
        })
    }

    async fn group_metadata(&self, jid: &str) -> Result<GroupMetadata, TransportError> {
        self.ensure_open()?;
        let response = self
            .state
            .client
            .call(Method::GET, &self.path(&format!("groups/{jid}")))
            .send()
            .await
            .map_err(request_error)?;
        let group: GroupResponse = read_json(response).await?;
        Ok(GroupMetadata {
            id: group.id,
            subject: group.subject,
        })
    }

    async fn close(&self) {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.cancel.cancel();

        let state = &self.state;
        let result = state
            .client
            .call(Method::DELETE, &state.base_path)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(session_id = %state.session_id, connection_id = %state.connection_id, "Bridge connection closed");
            }
            Ok(response) => {
                debug!(session_id = %state.session_id, connection_id = %state.connection_id, status = %response.status(), "Bridge refused close");
            }
            Err(e) => {
                debug!(session_id = %state.session_id, connection_id = %state.connection_id, error = %e, "Bridge close request failed");
            }
        }
    }
}

/// Forward SSE messages to the supervisor until the stream ends, a close
/// event arrives, the connection is closed locally, or nobody listens.
async fn pump_events(
    mut source: EventSource,
    tx: mpsc::Sender<TransportEvent>,
    state: Arc<ConnectionState>,
) {
    let session_id = state.session_id.clone();
    loop {
        let next = tokio::select! {
            _ = state.cancel.cancelled() => break,
            next = source.next() => next,
        };

        let message = match next {
            Some(Ok(Event::Open)) => continue,
            Some(Ok(Event::Message(message))) => message,
            Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                debug!(session_id = %session_id, "Bridge event stream ended");
                break;
            }
            Some(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Bridge event stream failed");
                break;
            }
        };

        let event = match parse_event(&message.event, &message.data) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(session_id = %session_id, event = %message.event, "Ignoring bridge event");
                continue;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Dropping malformed bridge event");
                continue;
            }
        };

        if let TransportEvent::Open(identity) = &event {
            state.set_identity(identity.clone());
        }
        let closing = matches!(event, TransportEvent::Closed(_));
        if tx.send(event).await.is_err() || closing {
            break;
        }
    }
    source.close();
}

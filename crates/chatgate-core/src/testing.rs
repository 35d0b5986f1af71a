//! In-memory port implementations for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use chatgate_types::error::{
    CredentialError, MediaError, PairingError, RepositoryError, TransportError,
};
use chatgate_types::message::{MessageRecord, NewMessageRecord, OutboundPayload, SendReceipt};
use chatgate_types::session::PairingArtifact;
use chatgate_types::transport::{
    ConnectionIdentity, GroupMetadata, ProtocolVersion, RegistrationLookup, TransportEvent,
};

use crate::credentials::CredentialStore;
use crate::media::MediaFetcher;
use crate::repository::message::MessageLog;
use crate::session::pairing::PairingRenderer;
use crate::transport::{ConnectRequest, TransportConnection, TransportConnector};

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum LookupBehavior {
    Answer(bool),
    Fail,
    Closed,
}

struct ConnectionState {
    identity: Mutex<Option<ConnectionIdentity>>,
    sent: Mutex<Vec<(String, OutboundPayload)>>,
    fail_send: AtomicBool,
    lookup: Mutex<LookupBehavior>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct MockConnection {
    state: Arc<ConnectionState>,
}

impl MockConnection {
    pub fn new(session_id: &str) -> Self {
        Self {
            state: Arc::new(ConnectionState {
                identity: Mutex::new(Some(ConnectionIdentity {
                    id: "5511999990000@s.whatsapp.net".to_string(),
                    name: Some(format!("{session_id} account")),
                })),
                sent: Mutex::new(Vec::new()),
                fail_send: AtomicBool::new(false),
                lookup: Mutex::new(LookupBehavior::Answer(true)),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_identity(&self, identity: Option<ConnectionIdentity>) {
        *self.state.identity.lock().unwrap() = identity;
    }

    pub fn set_lookup(&self, behavior: LookupBehavior) {
        *self.state.lookup.lock().unwrap() = behavior;
    }

    pub fn fail_sends(&self) {
        self.state.fail_send.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, OutboundPayload)> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    fn lookup_behavior(&self) -> LookupBehavior {
        *self.state.lookup.lock().unwrap()
    }
}

impl TransportConnection for MockConnection {
    fn identity(&self) -> Option<ConnectionIdentity> {
        self.state.identity.lock().unwrap().clone()
    }

    async fn send(
        &self,
        destination: &str,
        payload: OutboundPayload,
    ) -> Result<SendReceipt, TransportError> {
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected {
                status: 500,
                message: "internal-server-error".to_string(),
            });
        }
        let mut sent = self.state.sent.lock().unwrap();
        sent.push((destination.to_string(), payload));
        Ok(SendReceipt {
            message_id: format!("MSG{}", sent.len()),
            destination: destination.to_string(),
        })
    }

    async fn lookup(&self, jid: &str) -> Result<RegistrationLookup, TransportError> {
        match self.lookup_behavior() {
            LookupBehavior::Answer(exists) => Ok(RegistrationLookup {
                jid: jid.to_string(),
                exists,
            }),
            LookupBehavior::Fail => Err(TransportError::Rejected {
                status: 400,
                message: "bad-request".to_string(),
            }),
            LookupBehavior::Closed => Err(TransportError::ConnectionClosed),
        }
    }

    async fn group_metadata(&self, jid: &str) -> Result<GroupMetadata, TransportError> {
        match self.lookup_behavior() {
            LookupBehavior::Answer(true) => Ok(GroupMetadata {
                id: jid.to_string(),
                subject: Some("Team".to_string()),
            }),
            LookupBehavior::Answer(false) => Ok(GroupMetadata {
                id: String::new(),
                subject: None,
            }),
            LookupBehavior::Fail => Err(TransportError::Rejected {
                status: 404,
                message: "item-not-found".to_string(),
            }),
            LookupBehavior::Closed => Err(TransportError::Rejected {
                status: TransportError::CONNECTION_CLOSED_STATUS,
                message: "Connection Closed".to_string(),
            }),
        }
    }

    async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// A connection handed out by [`MockConnector`], with the sender that feeds
/// its event stream.
#[derive(Clone)]
pub struct OpenedConnection {
    pub request: ConnectRequest,
    pub connection: MockConnection,
    pub events: mpsc::Sender<TransportEvent>,
}

#[derive(Default)]
struct ConnectorState {
    opened: Mutex<Vec<OpenedConnection>>,
    failing: Mutex<HashSet<String>>,
    connect_delay: Mutex<Duration>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<ConnectorState>,
}

impl MockConnector {
    pub fn fail_for(&self, session_id: &str) {
        self.state.failing.lock().unwrap().insert(session_id.to_string());
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    pub fn connect_count(&self, session_id: &str) -> usize {
        self.state
            .opened
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.session_id == session_id)
            .count()
    }

    pub fn latest(&self, session_id: &str) -> Option<OpenedConnection> {
        self.state
            .opened
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.request.session_id == session_id)
            .cloned()
    }

    pub fn connections(&self, session_id: &str) -> Vec<OpenedConnection> {
        self.state
            .opened
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.session_id == session_id)
            .cloned()
            .collect()
    }

    /// End the event stream of the newest connection of `session_id`
    /// without sending a close event.
    pub fn end_stream(&self, session_id: &str) {
        let mut opened = self.state.opened.lock().unwrap();
        if let Some(entry) = opened
            .iter_mut()
            .rev()
            .find(|c| c.request.session_id == session_id)
        {
            let (dead, _) = mpsc::channel(1);
            entry.events = dead;
        }
    }

    /// Push an event onto the newest connection of `session_id`.
    pub async fn emit(&self, session_id: &str, event: TransportEvent) {
        let opened = self.latest(session_id).expect("no connection opened");
        opened.events.send(event).await.expect("event stream closed");
    }
}

impl TransportConnector for MockConnector {
    type Connection = MockConnection;

    async fn latest_version(&self) -> Result<ProtocolVersion, TransportError> {
        Ok(ProtocolVersion([2, 3000, 1]))
    }

    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<(MockConnection, mpsc::Receiver<TransportEvent>), TransportError> {
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.state.failing.lock().unwrap().contains(&request.session_id) {
            return Err(TransportError::Unavailable("connection refused".to_string()));
        }

        let connection = MockConnection::new(&request.session_id);
        let (tx, rx) = mpsc::channel(64);
        self.state.opened.lock().unwrap().push(OpenedConnection {
            request,
            connection: connection.clone(),
            events: tx,
        });
        Ok((connection, rx))
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    dirs: Arc<Mutex<HashMap<String, Option<serde_json::Value>>>>,
}

impl MemoryCredentialStore {
    pub fn with_sessions(ids: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut dirs = store.dirs.lock().unwrap();
            for id in ids {
                dirs.insert(id.to_string(), Some(serde_json::json!({ "me": id })));
            }
        }
        store
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.dirs.lock().unwrap().contains_key(session_id)
    }

    pub fn stored(&self, session_id: &str) -> Option<serde_json::Value> {
        self.dirs.lock().unwrap().get(session_id).cloned().flatten()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn prepare(&self, session_id: &str) -> Result<(), CredentialError> {
        self.dirs
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert(None);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<serde_json::Value>, CredentialError> {
        Ok(self.stored(session_id))
    }

    async fn save(
        &self,
        session_id: &str,
        credentials: &serde_json::Value,
    ) -> Result<(), CredentialError> {
        self.dirs
            .lock()
            .unwrap()
            .insert(session_id.to_string(), Some(credentials.clone()));
        Ok(())
    }

    async fn purge(&self, session_id: &str) -> Result<(), CredentialError> {
        self.dirs.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn list_session_ids(&self) -> Result<Vec<String>, CredentialError> {
        let mut ids: Vec<String> = self.dirs.lock().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Clone, Default)]
pub struct MemoryMessageLog {
    records: Arc<Mutex<Vec<MessageRecord>>>,
    next_id: Arc<AtomicI64>,
    fail: Arc<AtomicBool>,
}

impl MemoryMessageLog {
    pub fn records(&self) -> Vec<MessageRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn fail_appends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl MessageLog for MemoryMessageLog {
    async fn append(&self, record: &NewMessageRecord) -> Result<i64, RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().unwrap().push(MessageRecord {
            id,
            phone: record.phone.clone(),
            name: record.name.clone(),
            receiver: record.receiver.clone(),
            text: record.text.clone(),
            link: record.link.clone(),
            timestamp: record.timestamp.clone(),
        });
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<MessageRecord>, RepositoryError> {
        Ok(self.records())
    }
}

// ---------------------------------------------------------------------------
// Media and pairing
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockFetcher {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies.lock().unwrap().insert(url.to_string(), body.to_vec());
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl MediaFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(MediaError::Status(404))
    }
}

#[derive(Clone, Default)]
pub struct MockRenderer {
    displayed: Arc<Mutex<Vec<(String, String)>>>,
    fail: Arc<AtomicBool>,
}

impl MockRenderer {
    pub fn displayed(&self) -> Vec<(String, String)> {
        self.displayed.lock().unwrap().clone()
    }

    pub fn fail_encoding(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl PairingRenderer for MockRenderer {
    fn display(&self, session_id: &str, code: &str) {
        self.displayed
            .lock()
            .unwrap()
            .push((session_id.to_string(), code.to_string()));
    }

    async fn encode(&self, code: &str) -> Result<PairingArtifact, PairingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PairingError::Encode("data too long".to_string()));
        }
        Ok(PairingArtifact {
            data_url: format!("data:text/plain,{code}"),
        })
    }
}

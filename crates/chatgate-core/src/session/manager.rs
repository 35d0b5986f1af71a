//! Session manager: creation, supervision, reconnection, and removal.
//!
//! `SessionManager` owns the [`SessionRegistry`] and one supervisor task per
//! live connection. The supervisor consumes the connection's event stream in
//! order, runs each event through the [`SessionStateMachine`], and performs
//! the resulting actions. Recoverable closures replace the connection after a
//! backoff; a logout purges the session.
//!
//! Generic over the transport, credential store, and pairing renderer so the
//! core never depends on chatgate-infra.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use chatgate_types::config::GatewayConfig;
use chatgate_types::error::SessionError;
use chatgate_types::session::{PairingResult, SessionState, SessionStatus, is_valid_session_id};
use chatgate_types::transport::{DisconnectReason, TransportEvent};

use crate::credentials::CredentialStore;
use crate::session::exists::check_exists;
use crate::session::pairing::{PairingRenderer, PairingSink};
use crate::session::reconnect::ReconnectPolicy;
use crate::session::registry::{Reservation, SessionHandle, SessionRegistry, SessionSlot};
use crate::session::state_machine::{SessionStateMachine, SupervisorAction};
use crate::transport::{ConnectRequest, TransportConnection, TransportConnector};

/// Message delivered when a pairing code cannot be turned into an image.
pub const PAIRING_RENDER_FAILED: &str = "Unable to create QR code.";

/// Tunables for [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub reconnect: ReconnectPolicy,
    /// How long `create_session` waits for the pairing result.
    pub pairing_timeout: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            reconnect: ReconnectPolicy::from_config(&config.reconnect),
            pairing_timeout: Duration::from_secs(config.pairing.timeout_secs),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

/// Outcome of [`SessionManager::restore_sessions`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub failed: Vec<(String, String)>,
}

type Handle<C> = Arc<SessionHandle<<C as TransportConnector>::Connection>>;

pub struct SessionManager<C: TransportConnector, S: CredentialStore, R: PairingRenderer> {
    connector: C,
    credentials: S,
    renderer: R,
    registry: SessionRegistry<C::Connection>,
    options: SessionOptions,
}

impl<C, S, R> SessionManager<C, S, R>
where
    C: TransportConnector,
    S: CredentialStore + 'static,
    R: PairingRenderer + 'static,
{
    pub fn new(connector: C, credentials: S, renderer: R, options: SessionOptions) -> Self {
        Self {
            connector,
            credentials,
            renderer,
            registry: SessionRegistry::new(),
            options,
        }
    }

    pub fn registry(&self) -> &SessionRegistry<C::Connection> {
        &self.registry
    }

    pub fn credentials(&self) -> &S {
        &self.credentials
    }

    // --- Lookup ---

    /// The live connection for `id`, if one is bound.
    pub fn get(&self, id: &str) -> Option<Handle<C>> {
        self.registry.get(id)
    }

    /// Whether `id` has a registry entry, including one still connecting or
    /// waiting to reconnect.
    pub fn exists(&self, id: &str) -> bool {
        self.registry.exists(id)
    }

    pub fn status(&self, id: &str) -> Option<SessionStatus> {
        self.registry.status(id)
    }

    /// All registered ids with their status, sorted by id.
    pub fn list(&self) -> Vec<(String, SessionStatus)> {
        self.registry
            .ids()
            .into_iter()
            .filter_map(|id| self.registry.status(&id).map(|status| (id, status)))
            .collect()
    }

    /// Ask the session's connection whether `jid` exists.
    pub async fn check_exists(&self, id: &str, jid: &str, is_group: bool) -> Result<bool, SessionError> {
        let handle = self
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(check_exists(handle.connection(), jid, is_group).await?)
    }

    // --- Creation ---

    /// Create `id`, or join a creation already in progress.
    ///
    /// Resolves once a connection is bound to the entry. `sink` receives the
    /// pairing result only if this call performed the creation.
    pub async fn create(self: &Arc<Self>, id: &str, sink: PairingSink) -> Result<Handle<C>, SessionError> {
        if !is_valid_session_id(id) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        match self.registry.reserve(id) {
            Reservation::Existing(slot) => {
                debug!(session_id = %id, "Session already registered, joining");
                slot.wait_ready()
                    .await
                    .ok_or_else(|| SessionError::Abandoned(id.to_string()))
            }
            Reservation::Reserved(slot) => self.establish(id, &slot, sink).await,
        }
    }

    /// Create `id` and wait for its first pairing result.
    ///
    /// Fails with `AlreadyExists` if the id is registered in any state.
    pub async fn create_session(self: &Arc<Self>, id: &str) -> Result<PairingResult, SessionError> {
        if !is_valid_session_id(id) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        let slot = match self.registry.reserve(id) {
            Reservation::Existing(_) => return Err(SessionError::AlreadyExists(id.to_string())),
            Reservation::Reserved(slot) => slot,
        };

        let (sink, receiver) = PairingSink::channel();
        self.establish(id, &slot, sink).await?;

        match tokio::time::timeout(self.options.pairing_timeout, receiver).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(SessionError::PairingAborted(id.to_string())),
            Err(_) => {
                warn!(session_id = %id, "No pairing result before timeout");
                Err(SessionError::PairingTimeout(id.to_string()))
            }
        }
    }

    /// Connect into a freshly reserved slot; the reservation is released on failure.
    async fn establish(
        self: &Arc<Self>,
        id: &str,
        slot: &SessionSlot<C::Connection>,
        sink: PairingSink,
    ) -> Result<Handle<C>, SessionError> {
        info!(session_id = %id, "Creating session");
        let generation = slot.generation();
        match self.open(id, generation, 0, sink).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                error!(session_id = %id, error = %e, "Session creation failed");
                if let Some(slot) = self.registry.remove_if_current(id, generation) {
                    slot.retire();
                }
                Err(e)
            }
        }
    }

    /// Open a connection for the slot holding `generation` and start its supervisor.
    async fn open(
        self: &Arc<Self>,
        id: &str,
        generation: u64,
        attempt: u32,
        sink: PairingSink,
    ) -> Result<Handle<C>, SessionError> {
        let (connection, events) = match self.connect(id).await {
            Ok(opened) => opened,
            Err(e) => {
                if self.registry.is_deleted(id) {
                    self.purge_credentials(id).await;
                }
                return Err(e);
            }
        };
        let handle = Arc::new(SessionHandle::new(id, generation, connection, attempt));

        if !self.registry.finalize(id, generation, Arc::clone(&handle)) {
            info!(session_id = %id, "Session removed while connecting, discarding connection");
            handle.connection().close().await;
            // Storage prepared above must not outlive the removal.
            if self.registry.is_deleted(id) {
                self.purge_credentials(id).await;
            }
            return Err(SessionError::Abandoned(id.to_string()));
        }

        tokio::spawn(Arc::clone(self).supervise(Arc::clone(&handle), events, sink));
        Ok(handle)
    }

    async fn connect(
        &self,
        id: &str,
    ) -> Result<(C::Connection, mpsc::Receiver<TransportEvent>), SessionError> {
        self.credentials.prepare(id).await?;
        let credentials = self.credentials.load(id).await?;
        let version = self.connector.latest_version().await?;
        debug!(
            session_id = %id,
            %version,
            has_credentials = credentials.is_some(),
            "Opening transport connection"
        );
        let request = ConnectRequest {
            session_id: id.to_string(),
            credentials,
            version,
        };
        Ok(self.connector.connect(request).await?)
    }

    // --- Supervision ---

    async fn supervise(
        self: Arc<Self>,
        handle: Handle<C>,
        mut events: mpsc::Receiver<TransportEvent>,
        mut sink: PairingSink,
    ) {
        let mut machine = SessionStateMachine::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = handle.cancelled() => {
                    debug!(session_id = %handle.id(), "Supervisor cancelled, closing connection");
                    handle.connection().close().await;
                    handle.set_state(SessionState::Closed);
                    return;
                }
                event = events.recv() => {
                    // Stream end without a close event is a lost connection.
                    event.unwrap_or(TransportEvent::Closed(DisconnectReason::ConnectionLost))
                }
            };

            let actions = machine.apply(event);
            handle.set_state(machine.state());
            for action in actions {
                self.perform(&handle, &mut sink, action).await;
            }

            if machine.state() == SessionState::Closed {
                break;
            }
        }
        // Dropping `sink` here tells a still-waiting creator that no result is coming.
    }

    async fn perform(self: &Arc<Self>, handle: &Handle<C>, sink: &mut PairingSink, action: SupervisorAction) {
        let id = handle.id();
        match action {
            SupervisorAction::PersistCredentials(credentials) => {
                self.persist_credentials(handle, &credentials).await;
            }
            SupervisorAction::DeliverPairingCode(code) => {
                self.deliver_pairing_code(handle, sink, &code).await;
            }
            SupervisorAction::ResolveConnected => {
                info!(session_id = %id, "Session connected");
                if self.registry.is_current(id, handle.generation()) {
                    sink.resolve(PairingResult::Connected {
                        session_id: id.to_string(),
                    });
                }
            }
            SupervisorAction::Reconnect { reason, was_open } => {
                let attempt = if was_open {
                    0
                } else {
                    handle.reconnect_attempt().saturating_add(1)
                };
                warn!(session_id = %id, ?reason, attempt, "Connection closed, scheduling reconnect");
                handle.connection().close().await;
                tokio::spawn(Arc::clone(self).reconnect(id.to_string(), handle.generation(), attempt));
            }
            SupervisorAction::Purge(reason) => {
                warn!(session_id = %id, ?reason, "Session logged out, removing");
                handle.connection().close().await;
                if self.registry.remove_if_current(id, handle.generation()).is_some() {
                    self.purge_credentials(id).await;
                }
            }
        }
    }

    async fn persist_credentials(&self, handle: &Handle<C>, credentials: &serde_json::Value) {
        let id = handle.id();
        if !self.registry.is_current(id, handle.generation()) {
            debug!(session_id = %id, "Ignoring credentials of a retired connection");
            return;
        }
        if let Err(e) = self.credentials.save(id, credentials).await {
            error!(session_id = %id, error = %e, "Failed to persist credentials");
            return;
        }
        // A removal that raced the write must not leave storage behind.
        if self.registry.is_deleted(id) {
            self.purge_credentials(id).await;
        }
    }

    async fn deliver_pairing_code(&self, handle: &Handle<C>, sink: &mut PairingSink, code: &str) {
        let id = handle.id();
        self.renderer.display(id, code);

        if !sink.is_waiting() {
            debug!(session_id = %id, "Pairing code issued with no waiting caller");
            return;
        }

        let result = match self.renderer.encode(code).await {
            Ok(artifact) => PairingResult::QrReceived { artifact },
            Err(e) => {
                error!(session_id = %id, error = %e, "Failed to render pairing code");
                PairingResult::Failed {
                    message: PAIRING_RENDER_FAILED.to_string(),
                }
            }
        };

        if !self.registry.is_current(id, handle.generation()) {
            debug!(session_id = %id, "Session removed while rendering pairing code");
            return;
        }
        sink.resolve(result);
    }

    // --- Reconnection ---

    /// Replace the closed connection of `previous_generation` with a new one.
    ///
    /// A fresh slot is reserved before the backoff sleep, so a removal during
    /// the wait retires it and stops the loop. Boxed because the future spawns
    /// supervisors that may in turn schedule reconnects.
    fn reconnect(
        self: Arc<Self>,
        id: String,
        previous_generation: u64,
        attempt: u32,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let Some(slot) = self.registry.replace_if_current(&id, previous_generation) else {
                debug!(session_id = %id, "Session removed, not reconnecting");
                return;
            };
            let generation = slot.generation();
            let mut attempt = attempt;

            loop {
                if !self.options.reconnect.allows(attempt) {
                    error!(
                        session_id = %id,
                        attempts = attempt,
                        "Giving up on reconnecting, credentials kept for the next restart"
                    );
                    if let Some(slot) = self.registry.remove_if_current(&id, generation) {
                        slot.retire();
                    }
                    return;
                }

                let delay = self.options.reconnect.delay_for_attempt(attempt);
                debug!(session_id = %id, attempt, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
                tokio::time::sleep(delay).await;

                if !self.registry.is_current(&id, generation) {
                    debug!(session_id = %id, "Session removed during backoff");
                    return;
                }

                match self.open(&id, generation, attempt, PairingSink::detached()).await {
                    Ok(_) => {
                        info!(session_id = %id, attempt, "Session reconnected");
                        return;
                    }
                    Err(SessionError::Abandoned(_)) => return,
                    Err(e) => {
                        warn!(session_id = %id, attempt, error = %e, "Reconnect attempt failed");
                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        })
    }

    // --- Removal ---

    /// Remove `id` and its stored credentials.
    ///
    /// Idempotent. A connection in any phase (connecting, awaiting pairing,
    /// open, or waiting to reconnect) is shut down and cannot come back.
    /// Storage cleanup failures are logged, never returned.
    pub async fn delete(&self, id: &str) {
        match self.registry.remove(id) {
            Some(slot) => {
                slot.retire();
                info!(session_id = %id, "Session removed");
            }
            None => debug!(session_id = %id, "Delete of unregistered session"),
        }
        self.purge_credentials(id).await;
    }

    async fn purge_credentials(&self, id: &str) {
        if let Err(e) = self.credentials.purge(id).await {
            warn!(session_id = %id, error = %e, "Failed to remove session credentials");
        }
    }

    // --- Bootstrap and shutdown ---

    /// Recreate every session that has stored credentials.
    ///
    /// Sessions are restored concurrently; one failing does not affect the
    /// others. Only listing the stored sessions can fail the whole call.
    pub async fn restore_sessions(self: &Arc<Self>) -> Result<RestoreReport, SessionError> {
        let ids = self.credentials.list_session_ids().await?;
        info!(count = ids.len(), "Restoring stored sessions");

        let mut tasks = JoinSet::new();
        for id in ids {
            let manager = Arc::clone(self);
            tasks.spawn(async move {
                let result = manager.create(&id, PairingSink::detached()).await;
                (id, result.map(|_| ()))
            });
        }

        let mut report = RestoreReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    info!(session_id = %id, "Session restored");
                    report.restored.push(id);
                }
                Ok((id, Err(e))) => {
                    error!(session_id = %id, error = %e, "Failed to restore session");
                    report.failed.push((id, e.to_string()));
                }
                Err(join_error) => {
                    error!(error = %join_error, "Restore task panicked");
                }
            }
        }
        report.restored.sort();
        Ok(report)
    }

    /// Close every connection and empty the registry. Credentials are kept.
    pub async fn shutdown(&self) {
        let drained = self.registry.drain();
        info!(count = drained.len(), "Shutting down sessions");
        for (_, slot) in drained {
            let live = slot.live();
            slot.retire();
            if let Some(handle) = live {
                handle.connection().close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryCredentialStore, MockConnector, MockRenderer, eventually};
    use chatgate_types::transport::ConnectionIdentity;

    type TestManager = SessionManager<MockConnector, MemoryCredentialStore, MockRenderer>;

    struct Harness {
        manager: Arc<TestManager>,
        connector: MockConnector,
        store: MemoryCredentialStore,
        renderer: MockRenderer,
    }

    fn harness_with(store: MemoryCredentialStore, options: SessionOptions) -> Harness {
        let connector = MockConnector::default();
        let renderer = MockRenderer::default();
        let manager = Arc::new(SessionManager::new(
            connector.clone(),
            store.clone(),
            renderer.clone(),
            options,
        ));
        Harness {
            manager,
            connector,
            store,
            renderer,
        }
    }

    fn fast_options() -> SessionOptions {
        SessionOptions {
            reconnect: ReconnectPolicy::new(10, 20, 3),
            pairing_timeout: Duration::from_secs(2),
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryCredentialStore::default(), fast_options())
    }

    fn open_event() -> TransportEvent {
        TransportEvent::Open(ConnectionIdentity {
            id: "5511999990000@s.whatsapp.net".to_string(),
            name: Some("Front desk".to_string()),
        })
    }

    async fn create_open(h: &Harness, id: &str) -> Handle<MockConnector> {
        let handle = h.manager.create(id, PairingSink::detached()).await.unwrap();
        h.connector.emit(id, open_event()).await;
        let watched = Arc::clone(&handle);
        eventually(move || watched.state() == SessionState::Open).await;
        handle
    }

    #[tokio::test]
    async fn create_session_delivers_pairing_artifact() {
        let h = harness();
        let manager = Arc::clone(&h.manager);
        let pending = tokio::spawn(async move { manager.create_session("sales").await });

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 1).await;
        h.connector
            .emit("sales", TransportEvent::PairingCode("2@abc,def".into()))
            .await;

        let result = pending.await.unwrap().unwrap();
        assert_eq!(
            result,
            PairingResult::QrReceived {
                artifact: chatgate_types::session::PairingArtifact {
                    data_url: "data:text/plain,2@abc,def".to_string(),
                }
            }
        );
        assert_eq!(
            h.renderer.displayed(),
            vec![("sales".to_string(), "2@abc,def".to_string())]
        );
        assert_eq!(h.manager.status("sales"), Some(SessionStatus::AwaitingPairing));
    }

    #[tokio::test]
    async fn repeated_pairing_codes_resolve_the_caller_once() {
        let h = harness();
        let manager = Arc::clone(&h.manager);
        let pending = tokio::spawn(async move { manager.create_session("sales").await });

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 1).await;
        h.connector
            .emit("sales", TransportEvent::PairingCode("first".into()))
            .await;
        h.connector
            .emit("sales", TransportEvent::PairingCode("second".into()))
            .await;
        h.connector.emit("sales", open_event()).await;

        let result = pending.await.unwrap().unwrap();
        assert_eq!(
            result,
            PairingResult::QrReceived {
                artifact: chatgate_types::session::PairingArtifact {
                    data_url: "data:text/plain,first".to_string(),
                }
            }
        );

        let manager = Arc::clone(&h.manager);
        eventually(move || manager.status("sales") == Some(SessionStatus::Open)).await;
        // Later codes are still shown to the operator.
        assert_eq!(
            h.renderer.displayed(),
            vec![
                ("sales".to_string(), "first".to_string()),
                ("sales".to_string(), "second".to_string()),
            ]
        );
        assert_eq!(h.connector.connect_count("sales"), 1);
    }

    #[tokio::test]
    async fn create_session_with_valid_credentials_reports_connected() {
        let h = harness_with(MemoryCredentialStore::with_sessions(&["sales"]), fast_options());
        let manager = Arc::clone(&h.manager);
        let pending = tokio::spawn(async move { manager.create_session("sales").await });

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 1).await;
        let request = h.connector.latest("sales").unwrap().request;
        assert!(request.credentials.is_some());
        h.connector.emit("sales", open_event()).await;

        let result = pending.await.unwrap().unwrap();
        assert_eq!(
            result,
            PairingResult::Connected {
                session_id: "sales".to_string()
            }
        );
    }

    #[tokio::test]
    async fn render_failure_is_reported_to_caller() {
        let h = harness();
        h.renderer.fail_encoding();
        let manager = Arc::clone(&h.manager);
        let pending = tokio::spawn(async move { manager.create_session("sales").await });

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 1).await;
        h.connector
            .emit("sales", TransportEvent::PairingCode("code".into()))
            .await;

        let result = pending.await.unwrap().unwrap();
        assert_eq!(
            result,
            PairingResult::Failed {
                message: PAIRING_RENDER_FAILED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn create_session_rejects_duplicates_and_bad_ids() {
        let h = harness();
        create_open(&h, "sales").await;

        let err = h.manager.create_session("sales").await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(_)));

        let err = h.manager.create_session("../etc").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidId(_)));
        assert_eq!(h.connector.connect_count("sales"), 1);
    }

    #[tokio::test]
    async fn pairing_timeout_keeps_session() {
        let options = SessionOptions {
            pairing_timeout: Duration::from_millis(50),
            ..fast_options()
        };
        let h = harness_with(MemoryCredentialStore::default(), options);
        let err = h.manager.create_session("slow").await.unwrap_err();
        assert!(matches!(err, SessionError::PairingTimeout(_)));
        assert!(h.manager.exists("slow"));
    }

    #[tokio::test]
    async fn logout_purges_session_and_aborts_waiter() {
        let h = harness();
        let manager = Arc::clone(&h.manager);
        let pending = tokio::spawn(async move { manager.create_session("sales").await });

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 1).await;
        h.connector
            .emit("sales", TransportEvent::CredentialsUpdated(serde_json::json!({"k": 1})))
            .await;
        h.connector
            .emit("sales", TransportEvent::Closed(DisconnectReason::LoggedOut))
            .await;

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::PairingAborted(_)));
        assert!(!h.manager.exists("sales"));
        let store = h.store.clone();
        eventually(move || !store.contains("sales")).await;
        assert_eq!(h.connector.connect_count("sales"), 1);
    }

    #[tokio::test]
    async fn credentials_updates_are_persisted() {
        let h = harness();
        create_open(&h, "sales").await;
        let creds = serde_json::json!({"noiseKey": "abc"});
        h.connector
            .emit("sales", TransportEvent::CredentialsUpdated(creds.clone()))
            .await;
        let store = h.store.clone();
        eventually(move || store.stored("sales") == Some(creds.clone())).await;
    }

    #[tokio::test]
    async fn recoverable_close_reconnects_with_new_generation() {
        let h = harness();
        let first = create_open(&h, "sales").await;
        h.connector
            .emit("sales", TransportEvent::Closed(DisconnectReason::RestartRequired))
            .await;

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 2).await;
        let manager = Arc::clone(&h.manager);
        let generation = first.generation();
        eventually(move || {
            manager
                .get("sales")
                .is_some_and(|handle| handle.generation() != generation)
        })
        .await;

        let second = h.manager.get("sales").unwrap();
        assert!(second.generation() > first.generation());
        assert!(second.connected_at() >= first.connected_at());
        assert_eq!(second.reconnect_attempt(), 0);
        assert!(h.store.contains("sales"));

        let connections = h.connector.connections("sales");
        assert!(connections[0].connection.is_closed());
        assert!(!connections[1].connection.is_closed());
    }

    #[tokio::test]
    async fn stream_end_counts_as_connection_lost() {
        let h = harness();
        create_open(&h, "sales").await;
        h.connector.end_stream("sales");

        let connector = h.connector.clone();
        eventually(move || connector.connect_count("sales") == 2).await;
        assert!(h.manager.exists("sales"));
    }

    #[tokio::test]
    async fn delete_during_backoff_prevents_resurrection() {
        let options = SessionOptions {
            reconnect: ReconnectPolicy::new(200, 200, 3),
            ..fast_options()
        };
        let h = harness_with(MemoryCredentialStore::default(), options);
        create_open(&h, "sales").await;
        h.connector
            .emit("sales", TransportEvent::Closed(DisconnectReason::ConnectionLost))
            .await;

        let manager = Arc::clone(&h.manager);
        eventually(move || manager.status("sales") == Some(SessionStatus::Reconnecting)).await;
        h.manager.delete("sales").await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(h.connector.connect_count("sales"), 1);
        assert!(!h.manager.exists("sales"));
        assert!(!h.store.contains("sales"));
    }

    #[tokio::test]
    async fn delete_while_connecting_abandons_creation() {
        let h = harness();
        h.connector.set_connect_delay(Duration::from_millis(100));
        let manager = Arc::clone(&h.manager);
        let pending = tokio::spawn(async move { manager.create_session("sales").await });

        let manager = Arc::clone(&h.manager);
        eventually(move || manager.exists("sales")).await;
        h.manager.delete("sales").await;

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Abandoned(_)));
        assert!(!h.manager.exists("sales"));
        assert!(!h.store.contains("sales"));
        assert!(h.connector.latest("sales").unwrap().connection.is_closed());
    }

    #[tokio::test]
    async fn delete_open_session_closes_connection() {
        let h = harness();
        create_open(&h, "sales").await;
        h.manager.delete("sales").await;

        let connection = h.connector.latest("sales").unwrap().connection;
        eventually(move || connection.is_closed()).await;
        assert!(!h.manager.exists("sales"));
        assert!(!h.store.contains("sales"));

        // Deleting again is harmless.
        h.manager.delete("sales").await;
        assert!(!h.manager.exists("sales"));
    }

    #[tokio::test]
    async fn concurrent_creates_share_one_connection() {
        let h = harness();
        h.connector.set_connect_delay(Duration::from_millis(50));
        let (a, b) = tokio::join!(
            h.manager.create("sales", PairingSink::detached()),
            h.manager.create("sales", PairingSink::detached()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.generation(), b.generation());
        assert_eq!(h.connector.connect_count("sales"), 1);
    }

    #[tokio::test]
    async fn reconnect_gives_up_but_keeps_credentials() {
        let h = harness_with(MemoryCredentialStore::with_sessions(&["sales"]), fast_options());
        create_open(&h, "sales").await;
        h.connector.fail_for("sales");
        h.connector
            .emit("sales", TransportEvent::Closed(DisconnectReason::ConnectionLost))
            .await;

        let manager = Arc::clone(&h.manager);
        eventually(move || !manager.exists("sales")).await;
        assert!(h.store.contains("sales"));
        // Failed attempts never reach the connector's list.
        assert_eq!(h.connector.connect_count("sales"), 1);
    }

    #[tokio::test]
    async fn restore_sessions_isolates_failures() {
        let store = MemoryCredentialStore::with_sessions(&["alpha", "beta"]);
        let h = harness_with(store, fast_options());
        h.connector.fail_for("beta");

        let report = h.manager.restore_sessions().await.unwrap();
        assert_eq!(report.restored, vec!["alpha".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "beta");

        assert!(h.manager.exists("alpha"));
        assert!(!h.manager.exists("beta"));
        assert!(h.store.contains("beta"));
    }

    #[tokio::test]
    async fn check_exists_requires_live_session() {
        let h = harness();
        let err = h
            .manager
            .check_exists("ghost", "1@s.whatsapp.net", false)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));

        create_open(&h, "sales").await;
        assert!(h
            .manager
            .check_exists("sales", "1@s.whatsapp.net", false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn shutdown_closes_everything_and_keeps_credentials() {
        let h = harness();
        create_open(&h, "a").await;
        create_open(&h, "b").await;
        assert_eq!(
            h.manager.list(),
            vec![
                ("a".to_string(), SessionStatus::Open),
                ("b".to_string(), SessionStatus::Open)
            ]
        );

        h.manager.shutdown().await;
        assert!(h.manager.list().is_empty());
        assert!(h.connector.latest("a").unwrap().connection.is_closed());
        assert!(h.connector.latest("b").unwrap().connection.is_closed());
        assert!(h.store.contains("a"));
        assert!(h.store.contains("b"));
    }

    #[tokio::test]
    async fn shutdown_during_reconnect_keeps_credentials() {
        let h = harness_with(MemoryCredentialStore::with_sessions(&["sales"]), fast_options());
        create_open(&h, "sales").await;
        h.connector.set_connect_delay(Duration::from_millis(150));
        h.connector
            .emit("sales", TransportEvent::Closed(DisconnectReason::ConnectionLost))
            .await;

        let manager = Arc::clone(&h.manager);
        eventually(move || manager.status("sales") == Some(SessionStatus::Reconnecting)).await;
        // Past the backoff, inside the delayed connect.
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.manager.shutdown().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(h.connector.connect_count("sales"), 2);
        assert!(h.connector.latest("sales").unwrap().connection.is_closed());
        assert!(!h.manager.exists("sales"));
        assert!(h.store.contains("sales"));
    }
}

//! Per-connection lifecycle state machine.
//!
//! Pure transition logic: a transport event goes in, the next state and the
//! side effects the supervisor must perform come out. No I/O happens here.

use chatgate_types::session::SessionState;
use chatgate_types::transport::{DisconnectReason, TransportEvent};

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorAction {
    /// Write updated credentials to the session's storage.
    PersistCredentials(serde_json::Value),
    /// Render the pairing code and deliver it to a waiting caller, if any.
    DeliverPairingCode(String),
    /// Tell a waiting caller the session is connected.
    ResolveConnected,
    /// Recoverable closure: replace this connection with a fresh one.
    Reconnect {
        reason: DisconnectReason,
        /// Whether this connection ever reached `Open`.
        was_open: bool,
    },
    /// Terminal closure: drop the session and its credentials.
    Purge(DisconnectReason),
}

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    was_open: bool,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            state: SessionState::Connecting,
            was_open: false,
        }
    }
}

impl SessionStateMachine {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn was_open(&self) -> bool {
        self.was_open
    }

    /// Apply one transport event.
    ///
    /// Events arriving after `Closed` are ignored; a connection closes once.
    pub fn apply(&mut self, event: TransportEvent) -> Vec<SupervisorAction> {
        use SessionState::*;

        if self.state == Closed {
            return Vec::new();
        }

        match event {
            TransportEvent::CredentialsUpdated(credentials) => {
                vec![SupervisorAction::PersistCredentials(credentials)]
            }
            TransportEvent::PairingCode(code) => match self.state {
                Connecting | AwaitingPairing => {
                    self.state = AwaitingPairing;
                    vec![SupervisorAction::DeliverPairingCode(code)]
                }
                // Already authenticated; a late code has nothing to pair.
                Open | Closed => Vec::new(),
            },
            TransportEvent::Open(_) => {
                let first = self.state != Open;
                self.state = Open;
                self.was_open = true;
                if first {
                    vec![SupervisorAction::ResolveConnected]
                } else {
                    Vec::new()
                }
            }
            TransportEvent::Closed(reason) => {
                self.state = Closed;
                if reason.is_terminal() {
                    vec![SupervisorAction::Purge(reason)]
                } else {
                    vec![SupervisorAction::Reconnect {
                        reason,
                        was_open: self.was_open,
                    }]
                }
            }
        }
    }
}

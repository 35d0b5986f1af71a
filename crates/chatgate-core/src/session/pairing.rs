//! Pairing result delivery.
//!
//! A caller creating a session may wait for exactly one [`PairingResult`].
//! The supervisor holds the sending side in a [`PairingSink`]; the first
//! resolution consumes it, later ones are no-ops.

use tokio::sync::oneshot;

use chatgate_types::error::PairingError;
use chatgate_types::session::{PairingArtifact, PairingResult};

/// Receiving side held by the waiting caller.
pub type PairingReceiver = oneshot::Receiver<PairingResult>;

/// Renders pairing codes for humans.
pub trait PairingRenderer: Send + Sync {
    /// Show a fresh pairing code to the operator (console output).
    fn display(&self, session_id: &str, code: &str);

    /// Encode a pairing code as a scannable image artifact.
    fn encode(
        &self,
        code: &str,
    ) -> impl std::future::Future<Output = Result<PairingArtifact, PairingError>> + Send;
}

/// Single-use sender of a session's pairing result.
#[derive(Debug, Default)]
pub struct PairingSink {
    tx: Option<oneshot::Sender<PairingResult>>,
}

impl PairingSink {
    /// A sink connected to a receiver the caller awaits.
    pub fn channel() -> (Self, PairingReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink nobody listens to (bootstrap and reconnection).
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Whether a caller is still waiting for a result.
    pub fn is_waiting(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver `result` if nothing was delivered yet.
    ///
    /// Returns `true` only if a waiting caller received it.
    pub fn resolve(&mut self, result: PairingResult) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

//! Session lifecycle: registry, per-connection supervision, pairing, and
//! automatic reconnection.

pub mod exists;
pub mod manager;
pub mod pairing;
pub mod reconnect;
pub mod registry;
pub mod state_machine;

pub use manager::{RestoreReport, SessionManager, SessionOptions};
pub use pairing::{PairingReceiver, PairingRenderer, PairingSink};
pub use reconnect::ReconnectPolicy;
pub use registry::{SessionHandle, SessionRegistry};

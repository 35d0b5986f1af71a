//! Session management and message dispatch for Chatgate.
//!
//! This crate defines the "ports" (transport, credential store, message log,
//! media fetcher, pairing renderer) that the infrastructure layer implements,
//! plus the logic built on them: the session registry, per-session lifecycle
//! supervision with reconnection, the pairing flow, and outbound dispatch.
//! It depends only on `chatgate-types` -- never on `chatgate-infra` or any
//! network/database crate.

pub mod credentials;
pub mod dispatch;
pub mod jid;
pub mod media;
pub mod repository;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

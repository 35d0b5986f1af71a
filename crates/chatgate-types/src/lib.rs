//! Shared domain types for Chatgate.
//!
//! This crate contains the domain types used across the gateway: sessions,
//! pairing results, outbound message content, persisted message records,
//! transport lifecycle events, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod transport;

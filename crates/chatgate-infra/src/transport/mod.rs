//! Transport adapters.
//!
//! The chat protocol itself runs in an external bridge process; this module
//! speaks to it over HTTP and Server-Sent Events.

pub mod bridge;
pub mod wire;

pub use bridge::{BridgeConnection, BridgeConnector};

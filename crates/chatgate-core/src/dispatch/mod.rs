//! Outbound message dispatch.

pub mod service;

pub use service::{MessageDispatcher, format_timestamp};

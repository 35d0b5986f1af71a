//! Infrastructure layer for Chatgate.
//!
//! Contains implementations of the port traits defined in `chatgate-core`:
//! the SQLite message log, the filesystem credential store, the HTTP media
//! fetcher, the QR pairing renderer, and the HTTP/SSE transport bridge client.

pub mod config;
pub mod filesystem;
pub mod media;
pub mod pairing;
pub mod sqlite;
pub mod transport;

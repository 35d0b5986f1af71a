//! SQLite storage layer.
//!
//! The message log backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod message;
pub mod pool;

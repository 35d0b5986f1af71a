//! Message log trait definition.
//!
//! The message log is append-only: one record per successful send, never
//! updated or deleted. The infrastructure layer implements it with SQLite.

use chatgate_types::error::RepositoryError;
use chatgate_types::message::{MessageRecord, NewMessageRecord};

/// Append-only store of sent messages.
///
/// `append` may be called concurrently for different sessions; no ordering
/// is required across records beyond each record's own insertion.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageLog: Send + Sync {
    /// Persist one record, returning its assigned id.
    fn append(
        &self,
        record: &NewMessageRecord,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// All records in insertion order.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<MessageRecord>, RepositoryError>> + Send;
}

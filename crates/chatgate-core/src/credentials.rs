//! CredentialStore trait for per-session transport credentials.
//!
//! Each session id owns one storage location (a directory named by a
//! deterministic convention in the filesystem adapter). The existence of that
//! location is what bootstrap uses to find sessions to restore.

use chatgate_types::error::CredentialError;

/// Per-session credential persistence, keyed by session id.
pub trait CredentialStore: Send + Sync {
    /// Ensure the storage location for `session_id` exists.
    fn prepare(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), CredentialError>> + Send;

    /// Load stored credentials, `None` if the session never authenticated.
    fn load(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, CredentialError>> + Send;

    /// Replace stored credentials with `credentials`.
    fn save(
        &self,
        session_id: &str,
        credentials: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), CredentialError>> + Send;

    /// Delete the storage location and everything in it. Absent is not an error.
    fn purge(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), CredentialError>> + Send;

    /// Session ids that currently have a storage location.
    fn list_session_ids(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, CredentialError>> + Send;
}

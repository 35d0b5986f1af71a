//! MediaFetcher trait for downloading remote media before a send.

use chatgate_types::error::MediaError;

/// Fetches the bytes behind a media URL into memory.
///
/// Implementations live in chatgate-infra (reqwest).
pub trait MediaFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, MediaError>> + Send;
}

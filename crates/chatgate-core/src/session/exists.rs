//! Recipient existence check.

use tracing::{debug, warn};

use chatgate_types::error::TransportError;

use crate::transport::TransportConnection;

/// Whether `jid` is a known group (`is_group`) or a registered account.
///
/// Lookup failures answer `false`, except when the connection itself is
/// closed: that makes the answer indeterminate, so the error is returned.
pub async fn check_exists<T: TransportConnection>(
    connection: &T,
    jid: &str,
    is_group: bool,
) -> Result<bool, TransportError> {
    let outcome = if is_group {
        connection
            .group_metadata(jid)
            .await
            .map(|metadata| !metadata.id.is_empty())
    } else {
        connection.lookup(jid).await.map(|lookup| lookup.exists)
    };

    match outcome {
        Ok(exists) => {
            debug!(jid, is_group, exists, "existence check");
            Ok(exists)
        }
        Err(e) if e.is_connection_closed() => Err(e),
        Err(e) => {
            warn!(jid, is_group, error = %e, "existence lookup failed; treating as absent");
            Ok(false)
        }
    }
}

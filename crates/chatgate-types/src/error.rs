use thiserror::Error;

/// Errors reported by the chat transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is closed or was interrupted mid-request.
    #[error("connection closed")]
    ConnectionClosed,

    /// The transport rejected the request.
    #[error("transport rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The transport could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The transport answered with something unexpected.
    #[error("transport protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Status code the transport uses for a closed connection.
    pub const CONNECTION_CLOSED_STATUS: u16 = 428;

    /// Whether the cause is a closed/interrupted connection, making any
    /// answer derived from this request indeterminate.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            TransportError::ConnectionClosed => true,
            TransportError::Rejected { status, message } => {
                *status == Self::CONNECTION_CLOSED_STATUS || message == "Connection Closed"
            }
            _ => false,
        }
    }
}

/// Errors from the per-session credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file is corrupt: {0}")]
    Corrupt(String),
}

/// Errors fetching remote media before a send.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media request failed: {0}")]
    Request(String),

    #[error("media server returned HTTP {0}")]
    Status(u16),

    #[error("media exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Errors turning a pairing code into a deliverable artifact.
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("could not encode pairing code: {0}")]
    Encode(String),
}

/// Errors from repository operations (used by trait definitions in chatgate-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),
}

/// Errors from session management operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid session id: '{0}'")]
    InvalidId(String),

    /// The session was removed while it was being created.
    #[error("session '{0}' was removed before it finished connecting")]
    Abandoned(String),

    #[error("no pairing result for session '{0}' within the timeout")]
    PairingTimeout(String),

    /// The session closed before the waiting caller received any result.
    #[error("session '{0}' closed before pairing completed")]
    PairingAborted(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Errors from outbound message dispatch.
///
/// Any of these aborts the whole send; nothing is persisted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("media fetch failed: {0}")]
    Media(#[from] MediaError),

    #[error("send failed: {0}")]
    Send(#[from] TransportError),

    #[error("message log append failed: {0}")]
    Persist(#[from] RepositoryError),
}

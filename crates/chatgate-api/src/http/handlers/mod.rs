//! HTTP request handlers for the REST API.

pub mod message;
pub mod session;

use chatgate_types::error::SessionError;
use chatgate_types::session::is_valid_session_id;

use crate::http::error::AppError;

/// Reject ids that could not name a credential directory.
pub(crate) fn validate_session_id(id: &str) -> Result<(), AppError> {
    if is_valid_session_id(id) {
        Ok(())
    } else {
        Err(SessionError::InvalidId(id.to_string()).into())
    }
}

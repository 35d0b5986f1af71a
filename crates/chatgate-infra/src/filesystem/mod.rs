//! Filesystem adapters for Chatgate.
//!
//! Session credentials live under `{data_dir}/sessions/auth_<id>/`; the
//! presence of such a directory is what bootstrap restores from.

pub mod credentials;

use std::path::{Path, PathBuf};

pub use credentials::FileCredentialStore;

/// Directory holding one `auth_<id>` directory per session.
pub fn sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CHATGATE_DATA_DIR` environment variable
/// 2. `~/.chatgate`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatgate");
    }

    // Last resort: current directory
    PathBuf::from(".chatgate")
}

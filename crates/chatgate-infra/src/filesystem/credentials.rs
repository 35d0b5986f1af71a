//! Filesystem implementation of `CredentialStore`.
//!
//! Layout: `{root}/auth_<id>/creds.json`. Writes go to a temporary file that
//! is renamed over the old one, so a crash never leaves half-written
//! credentials. `save` never creates the directory: once a session has been
//! purged, a late write fails instead of bringing the directory back.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chatgate_core::credentials::CredentialStore;
use chatgate_types::error::CredentialError;
use chatgate_types::session::{auth_dir_name, session_id_from_dir_name};
use tracing::debug;

const CREDENTIALS_FILE: &str = "creds.json";
const CREDENTIALS_TMP_FILE: &str = "creds.json.tmp";

/// Stores each session's credentials in its own `auth_<id>` directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/auth_<id>`.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(auth_dir_name(session_id))
    }
}

impl CredentialStore for FileCredentialStore {
    async fn prepare(&self, session_id: &str) -> Result<(), CredentialError> {
        tokio::fs::create_dir_all(self.session_dir(session_id)).await?;
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<serde_json::Value>, CredentialError> {
        let path = self.session_dir(session_id).join(CREDENTIALS_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CredentialError::Corrupt(format!("{}: {e}", path.display())))
    }

    async fn save(
        &self,
        session_id: &str,
        credentials: &serde_json::Value,
    ) -> Result<(), CredentialError> {
        let dir = self.session_dir(session_id);
        let content = serde_json::to_vec_pretty(credentials)
            .map_err(|e| CredentialError::Corrupt(e.to_string()))?;

        let tmp = dir.join(CREDENTIALS_TMP_FILE);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, dir.join(CREDENTIALS_FILE)).await?;
        debug!(session_id = %session_id, "Credentials written");
        Ok(())
    }

    async fn purge(&self, session_id: &str) -> Result<(), CredentialError> {
        match tokio::fs::remove_dir_all(self.session_dir(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_session_ids(&self) -> Result<Vec<String>, CredentialError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(session_id_from_dir_name) {
                Some(id) => ids.push(id.to_string()),
                None => debug!(dir = ?name, "Skipping non-session directory"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

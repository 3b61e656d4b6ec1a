//! File-backed session persistence so a sign-in survives restarts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::types::{IdentityError, Session};

/// JSON file holding the most recent session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing or unreadable file is "no session";
    /// a corrupt file is logged and treated the same way.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] on I/O failures other than
    /// not-found.
    pub async fn load(&self) -> Result<Option<Session>, IdentityError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IdentityError::Storage(e.to_string())),
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable session file");
                Ok(None)
            }
        }
    }

    /// Write the session to a sibling temp file readable only by the owner,
    /// then rename it over the real one.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] if the file cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        let json = serde_json::to_vec_pretty(session).map_err(|e| IdentityError::Storage(e.to_string()))?;

        let tmp = self.tmp_path();
        // A leftover temp file may carry looser permissions than we create with.
        let _ = tokio::fs::remove_file(&tmp).await;
        let written = write_private(&tmp, &json).await;
        let renamed = match written {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = renamed {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_error(e));
        }
        Ok(())
    }

    /// Remove the stored session. Removing an absent file succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] if the file exists but cannot be
    /// removed.
    pub async fn clear(&self) -> Result<(), IdentityError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IdentityError::Storage(e.to_string())),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn storage_error(e: std::io::Error) -> IdentityError {
    IdentityError::Storage(e.to_string())
}

#[cfg(test)]
#[path = "persist_test.rs"]
mod tests;

//! Attachment storage
//!
//! Keeps at most one submitted image per user, named after the user id.
//! Re-submitting replaces the previous file; no history is retained.

use crate::telegram::traits::UserId;
use std::path::{Path, PathBuf};
use tracing::info;

/// Attachment storage errors
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Failed to store attachment at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes submitted images to `<dir>/<user_id>.jpg`.
#[derive(Debug, Clone)]
pub struct AttachmentSink {
    dir: PathBuf,
}

impl AttachmentSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), AttachmentError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| AttachmentError::Io {
                path: self.dir.clone(),
                source,
            })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic storage path for a user's attachment.
    pub fn path_for(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.jpg", user))
    }

    /// Store `bytes` as the user's attachment, replacing any earlier one.
    pub async fn store(&self, user: &UserId, bytes: &[u8]) -> Result<PathBuf, AttachmentError> {
        let path = self.path_for(user);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| AttachmentError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Photo saved for user {}", user);
        Ok(path)
    }
}

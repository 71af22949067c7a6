use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Flat-directory store for uploaded images. Files are renamed to a
/// generated UUID on write so caller-supplied names never reach the
/// filesystem.
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes the image bytes under a fresh generated filename and
    /// returns that filename.
    pub async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, ServiceError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| ServiceError::Internal(format!("image store unavailable: {err}")))?;

        let filename = format!("{}.{}", Uuid::new_v4(), sanitize_extension(extension));
        let path = self.root.join(&filename);
        fs::write(&path, bytes)
            .await
            .map_err(|err| ServiceError::Internal(format!("image write failed: {err}")))?;
        Ok(filename)
    }

    /// Removes a stored image. Best effort: a missing file or an IO
    /// failure is logged, never surfaced, so record deletion cannot be
    /// blocked by the file store.
    pub async fn delete(&self, filename: &str) {
        let path = self.root.join(filename);
        if let Err(err) = fs::remove_file(&path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(file = %path.display(), error = %err, "failed to remove stored image");
            }
        }
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let filename = store.store(b"png bytes", "png").await.unwrap();
        assert!(filename.ends_with(".png"));
        assert!(store.path(&filename).exists());

        store.delete(&filename).await;
        assert!(!store.path(&filename).exists());
    }

    #[tokio::test]
    async fn delete_of_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        store.delete("does-not-exist.png").await;
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(sanitize_extension("PNG"), "png");
        assert_eq!(sanitize_extension("../jpg"), "jpg");
        assert_eq!(sanitize_extension("!!"), "bin");
    }
}

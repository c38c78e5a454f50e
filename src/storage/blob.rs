//! Filesystem-backed [`BlobStore`].

use super::{BlobStore, StorageError};
use crate::extraction::MediaKind;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Stores each upload as `document-<uuid>.<ext>` under a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the upload directory; it is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Upload directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        // Keys are bare file names; anything else would escape the root.
        if location.is_empty() || Path::new(location).file_name() != Some(OsStr::new(location)) {
            return Err(StorageError::Corrupt(format!(
                "invalid blob location `{location}`"
            )));
        }
        Ok(self.root.join(location))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, kind: MediaKind, bytes: &[u8]) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let location = format!("document-{}.{}", uuid::Uuid::new_v4(), kind.extension());
        let path = self.root.join(&location);
        discard_on_error(&path, tokio::fs::write(&path, bytes)).await?;
        tracing::debug!(%location, size_bytes = bytes.len(), "Stored upload bytes");
        Ok(location)
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.resolve(location)?).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(%location, "Blob already absent");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.resolve(location)?).await?)
    }
}

/// Run `write`, removing whatever it left at `path` if it fails.
async fn discard_on_error(
    path: &Path,
    write: impl Future<Output = io::Result<()>>,
) -> Result<(), StorageError> {
    let Err(err) = write.await else {
        return Ok(());
    };
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::warn!(path = %path.display(), error = %err, "Removed partially written upload"),
        Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
        Err(cleanup) => tracing::error!(
            path = %path.display(),
            error = %cleanup,
            "Failed to remove partially written upload"
        ),
    }
    Err(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("document-partial.pdf");

        let error = discard_on_error(&path, async {
            tokio::fs::write(&path, b"%PDF-1.4 trunc").await?;
            Err(io::Error::other("No space left on device"))
        })
        .await
        .expect_err("write failed");

        assert!(matches!(error, StorageError::Io(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_write_without_a_file_reports_the_write_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("document-never.pdf");

        let error = discard_on_error(&path, async { Err(io::Error::other("disk gone")) })
            .await
            .expect_err("write failed");

        assert!(error.to_string().contains("disk gone"));
    }

    #[tokio::test]
    async fn put_then_delete_removes_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsBlobStore::new(dir.path().join("uploads"));

        let location = store.put(MediaKind::Pdf, b"%PDF-1.4").await.expect("put");
        assert!(location.starts_with("document-"));
        assert!(location.ends_with(".pdf"));
        assert_eq!(
            std::fs::read(store.root().join(&location)).expect("read back"),
            b"%PDF-1.4"
        );

        store.delete(&location).await.expect("delete");
        assert!(!store.exists(&location).await.expect("exists"));
    }

    #[tokio::test]
    async fn deleting_missing_blob_succeeds() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsBlobStore::new(dir.path());
        store
            .delete("document-missing.txt")
            .await
            .expect("absent blob is fine");
    }

    #[tokio::test]
    async fn locations_cannot_escape_the_root() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsBlobStore::new(dir.path());
        let error = store.delete("../etc/passwd").await.expect_err("traversal");
        assert!(matches!(error, StorageError::Corrupt(_)));
    }

    #[tokio::test]
    async fn concurrent_puts_get_distinct_locations() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsBlobStore::new(dir.path());
        let (a, b) = tokio::join!(
            store.put(MediaKind::PlainText, b"a"),
            store.put(MediaKind::PlainText, b"b")
        );
        assert_ne!(a.expect("a"), b.expect("b"));
    }
}

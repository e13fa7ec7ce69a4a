//! Local-filesystem `ArtifactStore`. Keys are `"<uuid>/<filename>"` paths
//! relative to a configured root directory; content type is recorded
//! alongside the blob in a sidecar `.meta` file since the filesystem itself
//! carries no content-type header.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::artifact_store::StoredObject;
use hcc_domain::repositories::ArtifactStore;
use hcc_domain::value_objects::StorageKind;

pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn meta_path(&self, path: &str) -> PathBuf {
        self.root.join(format!("{path}.meta"))
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn store(&self, bytes: Vec<u8>, filename: &str, content_type: &str) -> Result<String> {
        let key = format!("{}/{}", Uuid::new_v4(), sanitize_filename(filename));
        let dest = self.blob_path(&key);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&dest, &bytes).await?;
        fs::write(self.meta_path(&key), content_type).await?;
        Ok(key)
    }

    async fn get(&self, path: &str) -> Result<StoredObject> {
        let blob = self.blob_path(path);
        let bytes = fs::read(&blob).await.map_err(|_| HccError::ArtifactNotFound {
            kind: "local".to_string(),
            path: path.to_string(),
        })?;
        let content_type = fs::read_to_string(self.meta_path(path)).await.unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(StoredObject { bytes, content_type })
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let blob = self.blob_path(path);
        let removed = fs::remove_file(&blob).await.is_ok();
        let _ = fs::remove_file(self.meta_path(path)).await;
        Ok(removed)
    }
}

/// Strips any path separators from a caller-supplied filename so `store`
/// never writes outside its uuid-prefixed directory.
fn sanitize_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("artifact")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let path = store.store(b"hello".to_vec(), "note.txt", "text/plain").await.unwrap();
        let stored = store.get(&path).await.unwrap();

        assert_eq!(stored.bytes, b"hello");
        assert_eq!(stored.content_type, "text/plain");
    }

    #[tokio::test]
    async fn get_of_missing_path_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let err = store.get("does/not/exist").await.unwrap_err();
        assert!(matches!(err, HccError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn delete_of_missing_path_returns_false_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn filename_path_traversal_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let path = store.store(b"x".to_vec(), "../../etc/passwd", "text/plain").await.unwrap();
        assert!(path.ends_with("/passwd"));
    }
}

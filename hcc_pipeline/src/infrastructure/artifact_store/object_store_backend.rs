//! S3- and GCS-backed `ArtifactStore`, unified behind the `object_store`
//! crate so both clouds share one implementation differing only in which
//! `object_store::ObjectStore` is constructed at startup (§4.2, §7.2).

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use uuid::Uuid;

use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::artifact_store::StoredObject;
use hcc_domain::repositories::ArtifactStore;
use hcc_domain::value_objects::StorageKind;

/// Backs `ArtifactStore` with any `object_store::ObjectStore` implementation.
/// Content type isn't part of `object_store`'s metadata model, so it is
/// recorded in a sidecar `<key>.meta` object next to the blob, mirroring
/// `LocalArtifactStore`'s approach.
pub struct ObjectStoreArtifactStore {
    store: Box<dyn ObjectStore>,
    kind: StorageKind,
}

impl ObjectStoreArtifactStore {
    pub fn new(store: Box<dyn ObjectStore>, kind: StorageKind) -> Self {
        Self { store, kind }
    }

    fn meta_path(key: &str) -> ObjectPath {
        ObjectPath::from(format!("{key}.meta"))
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreArtifactStore {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    async fn store(&self, bytes: Vec<u8>, filename: &str, content_type: &str) -> Result<String> {
        let key = format!("{}/{}", Uuid::new_v4(), sanitize_filename(filename));
        let object_path = ObjectPath::from(key.as_str());

        self.store
            .put(&object_path, Bytes::from(bytes).into())
            .await
            .map_err(|e| HccError::ArtifactStore(e.to_string()))?;
        self.store
            .put(&Self::meta_path(&key), Bytes::from(content_type.to_string()).into())
            .await
            .map_err(|e| HccError::ArtifactStore(e.to_string()))?;

        Ok(key)
    }

    async fn get(&self, path: &str) -> Result<StoredObject> {
        let object_path = ObjectPath::from(path);
        let result = self.store.get(&object_path).await.map_err(|_| HccError::ArtifactNotFound {
            kind: self.kind.as_str().to_string(),
            path: path.to_string(),
        })?;
        let bytes = result.bytes().await.map_err(|e| HccError::ArtifactStore(e.to_string()))?.to_vec();

        let content_type = match self.store.get(&Self::meta_path(path)).await {
            Ok(meta) => meta
                .bytes()
                .await
                .ok()
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            Err(_) => "application/octet-stream".to_string(),
        };

        Ok(StoredObject { bytes, content_type })
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let object_path = ObjectPath::from(path);
        let removed = self.store.delete(&object_path).await.is_ok();
        let _ = self.store.delete(&Self::meta_path(path)).await;
        Ok(removed)
    }
}

fn sanitize_filename(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("artifact")
        .to_string()
}

//! # Artifact Store Port
//!
//! Opaque byte storage behind a single interface over a pluggable backend
//! (local filesystem, S3, GCS), per §4.2. Keys take the form
//! `"<uuid>/<filename>"`; the store generates the uuid prefix at `store`
//! time so concurrent writes never collide on a key in normal flow.

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::storage_location::StorageKind;

/// A retrieved blob plus the content type the backend reports (or infers)
/// for it.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Which backend this store writes to (`local`, `s3`, `gcs`), recorded
    /// on the `Document.storage` field at creation time.
    fn kind(&self) -> StorageKind;

    /// Stores `bytes` under a fresh `"<uuid>/<filename>"` key and returns
    /// that key's path component. Once this returns, a subsequent `get`
    /// with the same path must return byte-identical content.
    async fn store(&self, bytes: Vec<u8>, filename: &str, content_type: &str) -> Result<String>;

    /// Retrieves a previously stored blob, or `HccError::ArtifactNotFound`.
    async fn get(&self, path: &str) -> Result<StoredObject>;

    /// Deletes a blob. Missing-or-failed is not an error: per the open
    /// question on S3/GCS delete semantics, this returns `Ok(false)` for
    /// both "not found" and "backend reported failure," reserving `Err`
    /// for inputs the caller controls (e.g. a malformed key).
    async fn delete(&self, path: &str) -> Result<bool>;
}

/// Serializes `value` with stable 2-space-indented UTF-8 JSON and stores it
/// with content type `application/json`. `filename_hint` becomes the stored
/// filename (e.g. `"extraction.json"`).
///
/// This is a free function rather than a trait method so `ArtifactStore`
/// itself stays object-safe (`Arc<dyn ArtifactStore>` is how every stage
/// worker holds its store); a generic method on the trait would rule that
/// out.
pub async fn store_json<S, T>(store: &S, value: &T, filename_hint: &str) -> Result<String>
where
    S: ArtifactStore + ?Sized,
    T: serde::Serialize + Sync,
{
    let bytes = serde_json::to_vec_pretty(value).map_err(crate::error::HccError::from)?;
    store.store(bytes, filename_hint, "application/json").await
}

//! # Gateway Service
//!
//! Implements the document use cases the HTTP surface exposes (§6.1):
//! upload, list, get, download, reprocess, delete. This is the only place
//! that coordinates all three of registry, artifact store, and bus for a
//! single caller-facing operation, as opposed to the stage handlers which
//! each touch one artifact and one event.

use std::sync::Arc;

use hcc_domain::entities::document::{Document, DocumentStatus};
use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::{ArtifactStore, DocumentRegistry, MessageBus, StoredObject};
use hcc_domain::value_objects::{DocumentFilter, DocumentId, Page, Pagination, StorageLocation};

use crate::application::extractor_stage::document_uploaded_message;

/// Identity of the caller making a gateway request, used for owner-scoping
/// (§4.1, `Document::is_accessible_by`).
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub caller_id: Option<String>,
    pub is_superuser: bool,
}

pub struct GatewayService {
    registry: Arc<dyn DocumentRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<dyn MessageBus>,
}

impl GatewayService {
    pub fn new(registry: Arc<dyn DocumentRegistry>, artifacts: Arc<dyn ArtifactStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { registry, artifacts, bus }
    }

    /// `POST /documents`. Stores the blob, inserts the registry row, then
    /// publishes `document.uploaded`. If publishing fails, both the blob
    /// and the row are rolled back best-effort (§5 backpressure: "failure
    /// to publish ... results in a document in Pending state that is
    /// rolled back").
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str, content_type: &str, owner_id: Option<String>) -> Result<Document> {
        let file_size = bytes.len() as u64;
        let storage_path = self.artifacts.store(bytes, filename, content_type).await?;

        let document = Document::new(
            filename.to_string(),
            file_size,
            content_type.to_string(),
            StorageLocation::new(self.artifacts.kind(), storage_path.clone()),
            owner_id,
        );
        let document = match self.registry.create(document).await {
            Ok(document) => document,
            Err(e) => {
                let _ = self.artifacts.delete(&storage_path).await;
                return Err(e);
            }
        };

        let message = document_uploaded_message(document.id.as_uuid(), storage_path.clone(), self.artifacts.kind(), content_type.to_string(), None, false);
        if let Err(e) = publish(self.bus.as_ref(), &message, false).await {
            let _ = self.artifacts.delete(&storage_path).await;
            let _ = self.registry.delete(document.id).await;
            return Err(e);
        }

        Ok(document)
    }

    /// `GET /documents`, owner-scoped unless the caller is a superuser.
    pub async fn list(&self, caller: &CallerContext, mut filter: DocumentFilter, pagination: Pagination) -> Result<Page<Document>> {
        if !caller.is_superuser {
            filter.owner_id = caller.caller_id.clone();
        }
        self.registry.list(filter, pagination).await
    }

    /// `GET /documents/{id}`. Returns `HccError::NotFound` if the caller
    /// is not permitted to see it, same as if it didn't exist — a 403
    /// carrying existence information would leak more than a 404.
    pub async fn get(&self, caller: &CallerContext, id: DocumentId) -> Result<Document> {
        let document = self.registry.get(id).await?;
        if !document.is_accessible_by(caller.caller_id.as_deref(), caller.is_superuser) {
            return Err(HccError::NotFound(id.as_uuid()));
        }
        Ok(document)
    }

    /// `GET /documents/{id}/download`.
    pub async fn download(&self, caller: &CallerContext, id: DocumentId) -> Result<StoredObject> {
        let document = self.get(caller, id).await?;
        self.artifacts.get(&document.storage.path).await
    }

    /// `POST /documents/{id}/reprocess`: resets the document to `Pending`
    /// and re-emits `document.uploaded` with `priority=true`.
    pub async fn reprocess(&self, caller: &CallerContext, id: DocumentId) -> Result<Document> {
        let document = self.get(caller, id).await?;
        let document = self.registry.reprocess(document.id).await?;

        let message = document_uploaded_message(
            document.id.as_uuid(),
            document.storage.path.clone(),
            document.storage.kind,
            document.content_type.clone(),
            None,
            true,
        );
        publish(self.bus.as_ref(), &message, true).await?;
        Ok(document)
    }

    /// `DELETE /documents/{id}`: deletes the blob best-effort, then the
    /// registry row.
    pub async fn delete(&self, caller: &CallerContext, id: DocumentId) -> Result<()> {
        let document = self.get(caller, id).await?;
        let _ = self.artifacts.delete(&document.storage.path).await;
        self.registry.delete(document.id).await
    }
}

async fn publish(bus: &dyn MessageBus, message: &hcc_domain::events::StageMessage, priority: bool) -> Result<()> {
    let routing_key = message.routing_key();
    let payload = serde_json::to_value(message).map_err(HccError::from)?;
    bus.publish(routing_key, payload, priority).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact_store::local::LocalArtifactStore;
    use crate::infrastructure::bus::in_memory::InMemoryBus;
    use crate::infrastructure::registry::in_memory::InMemoryRegistry;
    use hcc_domain::entities::document::DocumentStatus as Status;

    fn service() -> GatewayService {
        let registry = Arc::new(InMemoryRegistry::new());
        let artifacts = Arc::new(LocalArtifactStore::new(tempfile::tempdir().unwrap().keep()));
        let bus = Arc::new(InMemoryBus::new());
        GatewayService::new(registry, artifacts, bus)
    }

    #[tokio::test]
    async fn upload_creates_pending_document_and_publishes() {
        let service = service();
        let document = service.upload(b"hello".to_vec(), "note.txt", "text/plain", Some("alice".to_string())).await.unwrap();
        assert_eq!(document.status, Status::Pending);
        assert_eq!(document.owner_id.as_deref(), Some("alice"));
        assert_eq!(document.file_size, 5);
    }

    #[tokio::test]
    async fn non_owner_cannot_see_document() {
        let service = service();
        let document = service.upload(b"hello".to_vec(), "note.txt", "text/plain", Some("alice".to_string())).await.unwrap();

        let bob = CallerContext {
            caller_id: Some("bob".to_string()),
            is_superuser: false,
        };
        let err = service.get(&bob, document.id).await.unwrap_err();
        assert!(matches!(err, HccError::NotFound(_)));
    }

    #[tokio::test]
    async fn superuser_can_see_any_document() {
        let service = service();
        let document = service.upload(b"hello".to_vec(), "note.txt", "text/plain", Some("alice".to_string())).await.unwrap();

        let admin = CallerContext {
            caller_id: Some("admin".to_string()),
            is_superuser: true,
        };
        assert!(service.get(&admin, document.id).await.is_ok());
    }

    #[tokio::test]
    async fn reprocess_resets_to_pending() {
        let service = service();
        let document = service.upload(b"hello".to_vec(), "note.txt", "text/plain", None).await.unwrap();
        let caller = CallerContext::default();

        service.registry.update_status(document.id, Status::Extracting, None).await.unwrap();
        let reprocessed = service.reprocess(&caller, document.id).await.unwrap();
        assert_eq!(reprocessed.status, Status::Pending);
        assert!(reprocessed.total_conditions.is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_registry_row() {
        let service = service();
        let document = service.upload(b"hello".to_vec(), "note.txt", "text/plain", None).await.unwrap();
        let caller = CallerContext::default();

        service.delete(&caller, document.id).await.unwrap();
        assert!(service.registry.get(document.id).await.is_err());
    }
}

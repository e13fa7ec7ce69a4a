//! An in-process `DocumentRegistry` backed by a `Mutex<HashMap<...>>`.
//! Used by stage unit tests and by `hcc-watcher`/batch-mode smoke tests that
//! don't want a live Postgres instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use hcc_domain::entities::document::{Document, DocumentStatus};
use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::document_registry::ResultsUpdate;
use hcc_domain::repositories::DocumentRegistry;
use hcc_domain::value_objects::{DocumentFilter, DocumentId, Page, Pagination};

#[derive(Default)]
pub struct InMemoryRegistry {
    documents: Mutex<HashMap<DocumentId, Document>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRegistry for InMemoryRegistry {
    async fn create(&self, document: Document) -> Result<Document> {
        let mut documents = self.documents.lock().unwrap();
        if documents.values().any(|d| d.storage == document.storage) {
            return Err(HccError::Conflict(format!("a document already exists for storage path '{}'", document.storage.path)));
        }
        documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, id: DocumentId) -> Result<Document> {
        self.documents.lock().unwrap().get(&id).cloned().ok_or_else(|| HccError::NotFound(id.as_uuid()))
    }

    async fn list(&self, filter: DocumentFilter, pagination: Pagination) -> Result<Page<Document>> {
        let documents = self.documents.lock().unwrap();
        let mut matching: Vec<Document> = documents
            .values()
            .filter(|d| filter.status.map(|s| s == d.status).unwrap_or(true))
            .filter(|d| filter.owner_id.as_deref().map(|o| d.owner_id.as_deref() == Some(o)).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.skip as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(Page {
            items,
            total,
            skip: pagination.skip,
            limit: pagination.limit,
        })
    }

    async fn count_by_status(&self, status: DocumentStatus, owner_id: Option<&str>) -> Result<u64> {
        let documents = self.documents.lock().unwrap();
        Ok(documents
            .values()
            .filter(|d| d.status == status)
            .filter(|d| owner_id.map(|o| d.owner_id.as_deref() == Some(o)).unwrap_or(true))
            .count() as u64)
    }

    async fn update_status(&self, id: DocumentId, status: DocumentStatus, errors: Option<String>) -> Result<Document> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.get_mut(&id).ok_or_else(|| HccError::NotFound(id.as_uuid()))?;
        document.transition_to(status, errors)?;
        Ok(document.clone())
    }

    async fn update_results(&self, id: DocumentId, update: ResultsUpdate) -> Result<Document> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.get_mut(&id).ok_or_else(|| HccError::NotFound(id.as_uuid()))?;

        if let Some(v) = update.total_conditions {
            document.total_conditions = Some(v);
        }
        if let Some(v) = update.hcc_relevant_conditions {
            document.hcc_relevant_conditions = Some(v);
        }
        if let Some(v) = update.compliant_conditions {
            document.compliant_conditions = Some(v);
        }
        if let Some(v) = update.extraction_result_path {
            document.extraction_result_path = Some(v);
        }
        if let Some(v) = update.analysis_result_path {
            document.analysis_result_path = Some(v);
        }
        if let Some(v) = update.validation_result_path {
            document.validation_result_path = Some(v);
        }
        if let Some(v) = update.patient_info {
            document.patient_info = Some(v);
        }
        document.merge_metadata(update.metadata);
        document.updated_at = chrono::Utc::now();
        Ok(document.clone())
    }

    async fn reprocess(&self, id: DocumentId) -> Result<Document> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.get_mut(&id).ok_or_else(|| HccError::NotFound(id.as_uuid()))?;
        document.reprocess();
        Ok(document.clone())
    }

    async fn delete(&self, id: DocumentId) -> Result<()> {
        self.documents
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HccError::NotFound(id.as_uuid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcc_domain::value_objects::{StorageKind, StorageLocation};

    fn new_doc() -> Document {
        Document::new(
            "note.txt".to_string(),
            10,
            "text/plain".to_string(),
            StorageLocation::new(StorageKind::Local, "a/note.txt"),
            None,
        )
    }

    #[tokio::test]
    async fn create_rejects_duplicate_storage_location() {
        let registry = InMemoryRegistry::new();
        let doc = new_doc();
        registry.create(doc.clone()).await.unwrap();

        let mut dup = new_doc();
        dup.storage = doc.storage.clone();
        let err = registry.create(dup).await.unwrap_err();
        assert!(matches!(err, HccError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_results_merges_metadata_without_clobbering() {
        let registry = InMemoryRegistry::new();
        let doc = registry.create(new_doc()).await.unwrap();

        let mut metadata = hcc_domain::entities::document::Metadata::new();
        metadata.insert("a".to_string(), serde_json::json!(1));
        registry
            .update_results(
                doc.id,
                ResultsUpdate {
                    total_conditions: Some(3),
                    metadata,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut more = hcc_domain::entities::document::Metadata::new();
        more.insert("b".to_string(), serde_json::json!(2));
        let updated = registry
            .update_results(
                doc.id,
                ResultsUpdate {
                    metadata: more,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.total_conditions, Some(3));
        assert_eq!(updated.metadata.get("a"), Some(&serde_json::json!(1)));
        assert_eq!(updated.metadata.get("b"), Some(&serde_json::json!(2)));
    }
}

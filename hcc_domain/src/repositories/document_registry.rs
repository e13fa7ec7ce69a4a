//! # Document Registry Port
//!
//! The durable record of every document and its current processing state
//! (§4.1). `DocumentRegistry` is the only component that mutates `Document`
//! rows; every other piece of state (artifacts, messages) is derived.

use async_trait::async_trait;

use crate::entities::document::{Document, DocumentStatus, Metadata};
use crate::error::Result;
use crate::value_objects::{DocumentFilter, DocumentId, Page, Pagination};

/// A partial update to a document's derived results, applied by
/// `update_results`. Every field is optional so a stage worker can touch
/// only the counters and path it owns; `metadata` is shallow-merged,
/// last-writer-wins per key, never replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct ResultsUpdate {
    pub total_conditions: Option<u32>,
    pub hcc_relevant_conditions: Option<u32>,
    pub compliant_conditions: Option<u32>,
    pub extraction_result_path: Option<String>,
    pub analysis_result_path: Option<String>,
    pub validation_result_path: Option<String>,
    pub patient_info: Option<serde_json::Value>,
    pub metadata: Metadata,
}

/// Durable per-document state. Implementations must provide single-
/// statement transactional updates (§4.1 concurrency: "each update is a
/// single transactional statement; no cross-row transactions") and must
/// surface operational failures as `HccError::Registry` so stage workers
/// can treat them as retryable per the error taxonomy.
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Inserts a new document, returning it with a generated id and
    /// timestamps. Fails with `HccError::Conflict` if the
    /// `(storage.kind, storage.path)` pair already exists and the
    /// implementation enforces that optional uniqueness constraint.
    async fn create(&self, document: Document) -> Result<Document>;

    /// Fetches a document by id, or `HccError::NotFound`.
    async fn get(&self, id: DocumentId) -> Result<Document>;

    /// A page of documents ordered by `created_at desc`, narrowed by
    /// `filter`.
    async fn list(&self, filter: DocumentFilter, pagination: Pagination) -> Result<Page<Document>>;

    /// The number of documents in `status`, optionally narrowed to one
    /// owner.
    async fn count_by_status(&self, status: DocumentStatus, owner_id: Option<&str>) -> Result<u64>;

    /// Applies a forward status transition (or a move to `Failed`),
    /// stamping `processing_started_at`/`processing_completed_at` per the
    /// state machine in `Document::transition_to`. Returns
    /// `HccError::InvalidTransition` for an illegal move and
    /// `HccError::NotFound` if the document doesn't exist.
    async fn update_status(&self, id: DocumentId, status: DocumentStatus, errors: Option<String>) -> Result<Document>;

    /// Updates any subset of counters, result paths, patient info, and
    /// merges metadata. Never touches `status` — that's `update_status`'s
    /// job exclusively, keeping the two concerns separately auditable.
    async fn update_results(&self, id: DocumentId, update: ResultsUpdate) -> Result<Document>;

    /// Resets a document to `Pending`, nulling the three result paths and
    /// three counters (the administrative Reprocess operation). Legal from
    /// any status, including terminal ones.
    async fn reprocess(&self, id: DocumentId) -> Result<Document>;

    /// Removes the registry row. Does not touch artifacts — that's the
    /// caller's concern, per §3 lifecycle ("Destroyed by Delete").
    async fn delete(&self, id: DocumentId) -> Result<()>;
}

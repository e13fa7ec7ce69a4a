//! # Stage Runner Skeleton
//!
//! The shared shape every stage worker follows (§4.4):
//!
//! 1. Dequeue one message.
//! 2. Parse the payload; a wrong `message_type` or malformed field is
//!    logged and the message acked (dropped) — never a registry mutation.
//! 3. `update_status(id, <stage-in-progress>)`.
//! 4-7. Run the stage-specific algorithm (`StageHandler::run`), which
//!    loads inputs, produces and stores an artifact, updates results, and
//!    publishes the next event (or, for the terminal stage, marks the
//!    document `Completed`).
//! 8. Any error from step 4-7 is caught here, the document is marked
//!    `Failed` with the stringified reason, and the message is still
//!    acked — bad documents do not requeue forever, they live in the
//!    registry as a recorded failure.
//!
//! This module is deliberately the *only* place that knows about ack/nack
//! and the Failed-transition-on-error policy; `ExtractorStage`,
//! `AnalyzerStage`, and `ValidatorStage` implement [`StageHandler`] and
//! know nothing about the message bus's delivery mechanics, per the
//! redesign note on untangling cyclic imports between stage processors and
//! the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use hcc_bootstrap::shutdown::CancellationToken;
use hcc_domain::entities::document::{Document, DocumentStatus};
use hcc_domain::repositories::{DocumentRegistry, MessageBus};
use hcc_domain::value_objects::{DocumentFilter, DocumentId, Pagination};
use hcc_domain::{HccError, Result};
use serde_json::Value;

/// One stage's contract with the shared runner. `Parsed` is whatever
/// shape the stage needs out of the raw JSON payload (typically one of
/// the `*Payload` structs in `hcc_domain::events`).
#[async_trait]
pub trait StageHandler: Send + Sync {
    type Parsed: Send + Sync;

    /// The queue this stage consumes from (one of the `StageMessage`
    /// routing key constants).
    fn queue(&self) -> &'static str;

    /// The status this stage transitions the document into at entry,
    /// before any I/O beyond the transition itself (§9 open question
    /// decision: in-progress status is set at the top of the handler).
    fn in_progress_status(&self) -> DocumentStatus;

    /// The document registry this stage writes through, used by the
    /// skeleton for the entry transition and the Failed-on-error path.
    fn registry(&self) -> &Arc<dyn DocumentRegistry>;

    /// Parses and validates the raw payload. Returns `Ok(None)` to signal
    /// a message this stage should log and drop: wrong `message_type`,
    /// missing required field, or an unparseable `document_id` (§4.4 step
    /// 2, S4 in §8).
    fn parse(&self, payload: Value) -> Result<Option<Self::Parsed>>;

    /// The document this parsed message concerns.
    fn document_id(&self, parsed: &Self::Parsed) -> DocumentId;

    /// Runs steps 4-7 of the stage algorithm.
    async fn run(&self, parsed: Self::Parsed) -> Result<()>;
}

/// Runs `handler`'s consumer loop until `shutdown` fires. QoS is prefetch
/// 1: this loop never requests a second delivery before the current one
/// is acked or nacked (§4.3, §5).
pub async fn run_consumer_loop<H: StageHandler>(bus: Arc<dyn MessageBus>, handler: Arc<H>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(queue = handler.queue(), "consumer loop shutting down");
                break;
            }
            delivery = bus.receive(handler.queue()) => {
                match delivery {
                    Ok(delivery) => {
                        let tag = delivery.tag;
                        handle_one(&bus, &handler, delivery.payload).await;
                        if let Err(e) = bus.ack(tag).await {
                            tracing::error!(error = %e, "failed to ack message");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, queue = handler.queue(), "message bus receive failed, backing off");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

/// Processes one already-dequeued message against `handler`, applying the
/// shared skeleton's parse / entry-transition / run / Failed-on-error
/// steps. Split out from `run_consumer_loop` so batch mode (§6.1
/// `--mode=batch`) can drive the same logic against messages synthesized
/// from a registry scan instead of a live bus delivery.
pub async fn handle_one<H: StageHandler>(_bus: &Arc<dyn MessageBus>, handler: &Arc<H>, payload: Value) {
    let parsed = match handler.parse(payload) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            tracing::warn!(queue = handler.queue(), "dropping message: not applicable to this stage");
            return;
        }
        Err(e) => {
            tracing::warn!(queue = handler.queue(), error = %e, "dropping malformed message");
            return;
        }
    };

    let document_id = handler.document_id(&parsed);

    match handler.registry().update_status(document_id, handler.in_progress_status(), None).await {
        Ok(_) => {}
        // Status transitions are forward-only (`Document::can_transition_to`),
        // so a document that already reached or passed this stage rejects the
        // entry transition. That is exactly what a re-delivered message looks
        // like: the earlier delivery already ran this stage (possibly through
        // to Completed) before the ack was lost. Re-run the stage logic
        // anyway rather than dropping the message — it overwrites the
        // artifact with the same content and re-publishes the next event,
        // the "overwrite-and-republish" idempotency the message bus's
        // at-least-once delivery requires of every stage.
        Err(HccError::InvalidTransition { .. }) => {
            tracing::info!(document_id = %document_id, stage = ?handler.in_progress_status(), "document already at or past this stage, treating delivery as a re-run");
        }
        Err(e) => {
            tracing::error!(document_id = %document_id, error = %e, "failed to record stage entry, message will be retried");
            return;
        }
    }

    if let Err(e) = handler.run(parsed).await {
        tracing::error!(document_id = %document_id, error = %e, "stage failed for document");
        if let Err(update_err) = handler
            .registry()
            .update_status(document_id, DocumentStatus::Failed, Some(e.to_string()))
            .await
        {
            tracing::error!(document_id = %document_id, error = %update_err, "failed to record Failed status");
        }
    }
}

/// Drives `handler` once over every document currently sitting in
/// `ready_status`, synthesizing each one's payload with `to_payload`
/// rather than waiting on a live bus delivery (§6.1 `--mode=batch`).
/// `to_payload` returns `None` for a document that looks ready by status
/// but is missing the field the synthesized message needs (e.g. a result
/// path not yet written); such documents are skipped rather than retried.
/// Returns the number of documents handed to `handle_one`.
pub async fn run_batch_pass<H, F>(bus: Arc<dyn MessageBus>, handler: Arc<H>, registry: Arc<dyn DocumentRegistry>, ready_status: DocumentStatus, mut to_payload: F) -> Result<usize>
where
    H: StageHandler,
    F: FnMut(&Document) -> Option<Value>,
{
    const PAGE_SIZE: u32 = 100;
    let mut skip = 0;
    let mut processed = 0;

    loop {
        let filter = DocumentFilter {
            status: Some(ready_status),
            owner_id: None,
        };
        let page = registry.list(filter, Pagination::new(skip, PAGE_SIZE)).await?;
        if page.items.is_empty() {
            break;
        }

        for document in &page.items {
            match to_payload(document) {
                Some(payload) => {
                    handle_one(&bus, &handler, payload).await;
                    processed += 1;
                }
                None => {
                    tracing::warn!(document_id = %document.id, status = ?ready_status, "skipping batch candidate missing fields for this stage");
                }
            }
        }

        if page.items.len() < PAGE_SIZE as usize {
            break;
        }
        skip += PAGE_SIZE;
    }

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcc_domain::entities::document::{Document, DocumentStatus};
    use hcc_domain::repositories::document_registry::ResultsUpdate;
    use hcc_domain::value_objects::{DocumentFilter, Page, Pagination};
    use hcc_domain::HccError;
    use std::sync::Mutex;

    struct FakeRegistry {
        statuses: Mutex<Vec<DocumentStatus>>,
    }

    #[async_trait]
    impl DocumentRegistry for FakeRegistry {
        async fn create(&self, document: Document) -> Result<Document> {
            Ok(document)
        }
        async fn get(&self, _id: DocumentId) -> Result<Document> {
            Err(HccError::NotFound(uuid::Uuid::nil()))
        }
        async fn list(&self, _filter: DocumentFilter, pagination: Pagination) -> Result<Page<Document>> {
            Ok(Page {
                items: vec![],
                total: 0,
                skip: pagination.skip,
                limit: pagination.limit,
            })
        }
        async fn count_by_status(&self, _status: DocumentStatus, _owner_id: Option<&str>) -> Result<u64> {
            Ok(0)
        }
        async fn update_status(&self, _id: DocumentId, status: DocumentStatus, _errors: Option<String>) -> Result<Document> {
            self.statuses.lock().unwrap().push(status);
            Ok(Document::new(
                "f".into(),
                1,
                "text/plain".into(),
                hcc_domain::value_objects::StorageLocation::new(hcc_domain::value_objects::StorageKind::Local, "x"),
                None,
            ))
        }
        async fn update_results(&self, _id: DocumentId, _update: ResultsUpdate) -> Result<Document> {
            unimplemented!()
        }
        async fn reprocess(&self, _id: DocumentId) -> Result<Document> {
            unimplemented!()
        }
        async fn delete(&self, _id: DocumentId) -> Result<()> {
            Ok(())
        }
    }

    struct FakeHandler {
        registry: Arc<dyn DocumentRegistry>,
        fail: bool,
    }

    #[async_trait]
    impl StageHandler for FakeHandler {
        type Parsed = DocumentId;

        fn queue(&self) -> &'static str {
            "document.uploaded"
        }

        fn in_progress_status(&self) -> DocumentStatus {
            DocumentStatus::Extracting
        }

        fn registry(&self) -> &Arc<dyn DocumentRegistry> {
            &self.registry
        }

        fn parse(&self, payload: Value) -> Result<Option<Self::Parsed>> {
            match payload.get("document_id").and_then(|v| v.as_str()) {
                Some(raw) => match raw.parse::<DocumentId>() {
                    Ok(id) => Ok(Some(id)),
                    Err(_) => Ok(None),
                },
                None => Ok(None),
            }
        }

        fn document_id(&self, parsed: &Self::Parsed) -> DocumentId {
            *parsed
        }

        async fn run(&self, _parsed: Self::Parsed) -> Result<()> {
            if self.fail {
                Err(HccError::ArtifactStore("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn malformed_document_id_is_dropped_without_registry_mutation() {
        let registry = Arc::new(FakeRegistry { statuses: Mutex::new(vec![]) });
        let handler = Arc::new(FakeHandler {
            registry: registry.clone(),
            fail: false,
        });
        let bus: Arc<dyn MessageBus> = Arc::new(NoopBus);

        handle_one(&bus, &handler, serde_json::json!({ "document_id": "not-a-uuid" })).await;
        assert!(registry.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_run_transitions_to_in_progress_only() {
        let registry = Arc::new(FakeRegistry { statuses: Mutex::new(vec![]) });
        let handler = Arc::new(FakeHandler {
            registry: registry.clone(),
            fail: false,
        });
        let bus: Arc<dyn MessageBus> = Arc::new(NoopBus);

        let id = DocumentId::new();
        handle_one(&bus, &handler, serde_json::json!({ "document_id": id.to_string() })).await;
        assert_eq!(*registry.statuses.lock().unwrap(), vec![DocumentStatus::Extracting]);
    }

    #[tokio::test]
    async fn failed_run_records_failed_status() {
        let registry = Arc::new(FakeRegistry { statuses: Mutex::new(vec![]) });
        let handler = Arc::new(FakeHandler {
            registry: registry.clone(),
            fail: true,
        });
        let bus: Arc<dyn MessageBus> = Arc::new(NoopBus);

        let id = DocumentId::new();
        handle_one(&bus, &handler, serde_json::json!({ "document_id": id.to_string() })).await;
        assert_eq!(
            *registry.statuses.lock().unwrap(),
            vec![DocumentStatus::Extracting, DocumentStatus::Failed]
        );
    }

    #[tokio::test]
    async fn batch_pass_drives_handler_over_every_ready_document() {
        use crate::infrastructure::registry::in_memory::InMemoryRegistry;
        use hcc_domain::value_objects::StorageLocation;

        let scan_registry = Arc::new(InMemoryRegistry::new());
        let seed = Document::new(
            "note.txt".into(),
            10,
            "text/plain".into(),
            StorageLocation::new(hcc_domain::value_objects::StorageKind::Local, "seed/note.txt"),
            None,
        );
        scan_registry.create(seed).await.unwrap();

        let handler_registry = Arc::new(FakeRegistry { statuses: Mutex::new(vec![]) });
        let handler = Arc::new(FakeHandler {
            registry: handler_registry.clone(),
            fail: false,
        });
        let bus: Arc<dyn MessageBus> = Arc::new(NoopBus);

        let processed = run_batch_pass(bus, handler, scan_registry.clone(), DocumentStatus::Pending, |document| {
            Some(serde_json::json!({ "document_id": document.id.to_string() }))
        })
        .await
        .unwrap();

        assert_eq!(processed, 1);
        assert_eq!(*handler_registry.statuses.lock().unwrap(), vec![DocumentStatus::Extracting]);
    }

    #[tokio::test]
    async fn redelivery_after_completed_still_runs_the_stage_without_reverting_status() {
        use crate::infrastructure::registry::in_memory::InMemoryRegistry;
        use hcc_domain::value_objects::StorageLocation;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let registry: Arc<dyn DocumentRegistry> = Arc::new(InMemoryRegistry::new());
        let seed = Document::new(
            "note.txt".into(),
            10,
            "text/plain".into(),
            StorageLocation::new(hcc_domain::value_objects::StorageKind::Local, "seed/note.txt"),
            None,
        );
        let id = seed.id;
        registry.create(seed).await.unwrap();
        registry.update_status(id, DocumentStatus::Extracting, None).await.unwrap();
        registry.update_status(id, DocumentStatus::Analyzing, None).await.unwrap();
        registry.update_status(id, DocumentStatus::Validating, None).await.unwrap();
        registry.update_status(id, DocumentStatus::Completed, None).await.unwrap();

        struct CountingHandler {
            registry: Arc<dyn DocumentRegistry>,
            runs: AtomicUsize,
        }

        #[async_trait]
        impl StageHandler for CountingHandler {
            type Parsed = DocumentId;

            fn queue(&self) -> &'static str {
                "document.extraction.completed"
            }

            fn in_progress_status(&self) -> DocumentStatus {
                DocumentStatus::Analyzing
            }

            fn registry(&self) -> &Arc<dyn DocumentRegistry> {
                &self.registry
            }

            fn parse(&self, payload: Value) -> Result<Option<Self::Parsed>> {
                match payload.get("document_id").and_then(|v| v.as_str()) {
                    Some(raw) => Ok(raw.parse::<DocumentId>().ok()),
                    None => Ok(None),
                }
            }

            fn document_id(&self, parsed: &Self::Parsed) -> DocumentId {
                *parsed
            }

            async fn run(&self, _parsed: Self::Parsed) -> Result<()> {
                self.runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = Arc::new(CountingHandler {
            registry: registry.clone(),
            runs: AtomicUsize::new(0),
        });
        let bus: Arc<dyn MessageBus> = Arc::new(NoopBus);

        handle_one(&bus, &handler, serde_json::json!({ "document_id": id.to_string() })).await;

        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
        let document = registry.get(id).await.unwrap();
        assert_eq!(document.status, DocumentStatus::Completed);
    }

    struct NoopBus;

    #[async_trait]
    impl MessageBus for NoopBus {
        async fn publish(&self, _routing_key: &str, _payload: Value, _priority: bool) -> Result<()> {
            Ok(())
        }
        async fn receive(&self, _queue: &str) -> Result<hcc_domain::repositories::message_bus::Delivery> {
            unimplemented!("not exercised by these tests")
        }
        async fn ack(&self, _tag: u64) -> Result<()> {
            Ok(())
        }
        async fn nack(&self, _tag: u64, _requeue: bool) -> Result<()> {
            Ok(())
        }
    }
}

//! # Validator Stage
//!
//! Consumes `document.analysis.completed`, applies the Rules Engine (§4.7)
//! to every condition, and is the terminal stage: it is the only handler
//! that transitions a document to `Completed` rather than publishing the
//! next event for another worker to pick up.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use hcc_domain::entities::document::DocumentStatus;
use hcc_domain::events::{AnalysisCompletedPayload, Envelope, StageMessage, ValidationCompletedPayload};
use hcc_domain::repositories::artifact_store::store_json;
use hcc_domain::repositories::document_registry::ResultsUpdate;
use hcc_domain::repositories::{ArtifactStore, DocumentRegistry, HccReferenceProvider, MessageBus};
use hcc_domain::services::RulesEngine;
use hcc_domain::value_objects::DocumentId;
use hcc_domain::{HccError, Result};

use crate::application::artifacts::{AnalysisArtifact, ValidationArtifact, ValidationMetadata};
use crate::application::stage_runner::StageHandler;

pub struct ValidatorStage {
    registry: Arc<dyn DocumentRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<dyn MessageBus>,
    hcc: Arc<dyn HccReferenceProvider>,
    rules: RulesEngine,
}

impl ValidatorStage {
    pub fn new(registry: Arc<dyn DocumentRegistry>, artifacts: Arc<dyn ArtifactStore>, bus: Arc<dyn MessageBus>, hcc: Arc<dyn HccReferenceProvider>) -> Self {
        Self {
            registry,
            artifacts,
            bus,
            hcc,
            rules: RulesEngine::with_default_rules(),
        }
    }
}

#[async_trait]
impl StageHandler for ValidatorStage {
    type Parsed = AnalysisCompletedPayload;

    fn queue(&self) -> &'static str {
        StageMessage::ROUTING_ANALYSIS_COMPLETED
    }

    fn in_progress_status(&self) -> DocumentStatus {
        DocumentStatus::Validating
    }

    fn registry(&self) -> &Arc<dyn DocumentRegistry> {
        &self.registry
    }

    fn parse(&self, payload: Value) -> Result<Option<Self::Parsed>> {
        let message: StageMessage = serde_json::from_value(payload).map_err(|e| HccError::InvalidMessage(format!("could not parse envelope: {e}")))?;
        match message {
            StageMessage::AnalysisCompleted(payload) => Ok(Some(payload)),
            StageMessage::Unknown => Ok(None),
            other => {
                tracing::warn!(routing_key = other.routing_key(), "unexpected message_type on validation queue");
                Ok(None)
            }
        }
    }

    fn document_id(&self, parsed: &Self::Parsed) -> DocumentId {
        DocumentId::from_uuid(parsed.envelope.document_id)
    }

    async fn run(&self, payload: Self::Parsed) -> Result<()> {
        let document_id = DocumentId::from_uuid(payload.envelope.document_id);

        let analysis: AnalysisArtifact = {
            let stored = self.artifacts.get(&payload.analysis_result_path).await?;
            serde_json::from_slice(&stored.bytes).map_err(|e| HccError::ArtifactStore(format!("could not parse analysis artifact: {e}")))?
        };

        let hcc = self.hcc.current();
        let mut conditions = analysis.conditions;
        for condition in conditions.iter_mut() {
            let results = self.rules.evaluate(condition, &hcc);
            condition.is_compliant = Some(results.iter().all(|r| r.passed));
            condition.validation_results = results;
        }

        let total_conditions = conditions.len() as u32;
        let compliant_conditions = conditions.iter().filter(|c| c.is_compliant == Some(true)).count() as u32;
        let non_compliant_conditions = total_conditions - compliant_conditions;

        let artifact = ValidationArtifact {
            document_id: document_id.as_uuid(),
            conditions,
            metadata: ValidationMetadata {
                analysis_metadata: analysis.metadata,
                total_conditions,
                compliant_conditions,
                non_compliant_conditions,
            },
        };

        let path = store_json(self.artifacts.as_ref(), &artifact, "validation.json").await?;

        self.registry
            .update_results(
                document_id,
                ResultsUpdate {
                    compliant_conditions: Some(compliant_conditions),
                    validation_result_path: Some(path.clone()),
                    ..Default::default()
                },
            )
            .await?;

        // Terminal stage: mark the document Completed rather than handing
        // off to another worker. A re-delivery of this message against a
        // document already at Completed hits `InvalidTransition` here
        // (terminal states reject re-entry) — that is the same re-run
        // signal the skeleton's entry transition tolerates in
        // `stage_runner::handle_one`, so it must not stop this handler
        // from re-publishing `validation.completed` below (§4.4, S6).
        match self.registry.update_status(document_id, DocumentStatus::Completed, None).await {
            Ok(_) | Err(HccError::InvalidTransition { .. }) => {}
            Err(e) => return Err(e),
        }

        let next = StageMessage::ValidationCompleted(ValidationCompletedPayload {
            envelope: Envelope::new(document_id.as_uuid()),
            validation_result_path: path,
            compliant_conditions,
            total_conditions,
        });
        publish(self.bus.as_ref(), &next).await
    }
}

async fn publish(bus: &dyn MessageBus, message: &StageMessage) -> Result<()> {
    let routing_key = message.routing_key();
    let payload = serde_json::to_value(message).map_err(HccError::from)?;
    bus.publish(routing_key, payload, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact_store::local::LocalArtifactStore;
    use crate::infrastructure::bus::in_memory::InMemoryBus;
    use crate::infrastructure::hcc_reference::StaticHccReference;
    use crate::infrastructure::registry::in_memory::InMemoryRegistry;
    use hcc_domain::entities::document::{Document, DocumentStatus};
    use hcc_domain::entities::{Condition, HccEntry};
    use hcc_domain::value_objects::{StorageKind, StorageLocation};

    async fn setup() -> (Arc<ValidatorStage>, Arc<LocalArtifactStore>, Arc<InMemoryBus>, DocumentId, String) {
        let registry = Arc::new(InMemoryRegistry::new());
        let artifacts = Arc::new(LocalArtifactStore::new(tempfile::tempdir().unwrap().keep()));
        let bus = Arc::new(InMemoryBus::new());
        let hcc = Arc::new(StaticHccReference::from_entries([HccEntry::new(
            "E11.9",
            "Type 2 diabetes mellitus without complications",
            Some("HCC19".to_string()),
        )]));

        let document = Document::new(
            "note.txt".to_string(),
            10,
            "text/plain".to_string(),
            StorageLocation::new(StorageKind::Local, "seed/note.txt"),
            None,
        );
        let mut document = registry.create(document).await.unwrap();
        document = registry.update_status(document.id, DocumentStatus::Extracting, None).await.unwrap();
        document = registry.update_status(document.id, DocumentStatus::Analyzing, None).await.unwrap();
        let document_id = document.id;

        let mut compliant = Condition::new("1", "Type 2 diabetes mellitus");
        compliant.icd_code = Some("E11.9".to_string());
        compliant.icd_code_no_dot = Some("E119".to_string());
        compliant.icd_description = Some("Type 2 diabetes mellitus without complications".to_string());
        compliant.confidence = 1.0;
        compliant.hcc_relevant = Some(true);
        compliant.hcc_code = Some("E119".to_string());

        let mut non_compliant = Condition::new("2", "Unspecified condition");
        non_compliant.confidence = 0.2;

        let analysis = AnalysisArtifact {
            document_id: document_id.as_uuid(),
            conditions: vec![compliant, non_compliant],
            metadata: crate::application::artifacts::AnalysisMetadata {
                total_conditions: 2,
                hcc_relevant_count: 1,
                high_confidence_count: 1,
                mean_confidence: Some(0.6),
                error_count: 0,
                analysis_source: "rule_based".to_string(),
            },
            errors: vec![],
        };
        let path = store_json(artifacts.as_ref(), &analysis, "analysis.json").await.unwrap();

        let stage = Arc::new(ValidatorStage::new(registry, artifacts.clone(), bus.clone(), hcc));
        (stage, artifacts, bus, document_id, path)
    }

    #[tokio::test]
    async fn marks_completed_and_counts_compliance() {
        let (stage, artifacts, _bus, document_id, path) = setup().await;

        let payload = AnalysisCompletedPayload {
            envelope: Envelope::new(document_id.as_uuid()),
            analysis_result_path: path,
            hcc_relevant_conditions: 1,
        };
        stage.run(payload).await.unwrap();

        let doc = stage.registry.get(document_id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.compliant_conditions, Some(1));
        assert!(doc.processing_completed_at.is_some());

        let stored_path = doc.validation_result_path.unwrap();
        let stored = artifacts.get(&stored_path).await.unwrap();
        let artifact: ValidationArtifact = serde_json::from_slice(&stored.bytes).unwrap();
        assert_eq!(artifact.metadata.non_compliant_conditions, 1);
        assert!(artifact.conditions[0].is_compliant.unwrap());
        assert!(!artifact.conditions[1].is_compliant.unwrap());
    }

    #[tokio::test]
    async fn redelivery_after_completed_still_republishes_validation_completed() {
        let (stage, _artifacts, bus, document_id, path) = setup().await;

        let payload = AnalysisCompletedPayload {
            envelope: Envelope::new(document_id.as_uuid()),
            analysis_result_path: path.clone(),
            hcc_relevant_conditions: 1,
        };
        stage.run(payload).await.unwrap();
        assert_eq!(bus.pending(StageMessage::ROUTING_VALIDATION_COMPLETED), 1);

        // A second delivery of the same message against an already-
        // Completed document must not propagate `InvalidTransition` out of
        // `run`: the terminal `update_status(..., Completed, ...)` rejects
        // re-entry into a terminal state, but the handler still has to
        // re-publish `validation.completed` (§4.4 idempotency, §8 S6).
        let replay = AnalysisCompletedPayload {
            envelope: Envelope::new(document_id.as_uuid()),
            analysis_result_path: path,
            hcc_relevant_conditions: 1,
        };
        stage.run(replay).await.unwrap();

        let doc = stage.registry.get(document_id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(bus.pending(StageMessage::ROUTING_VALIDATION_COMPLETED), 2);
    }
}

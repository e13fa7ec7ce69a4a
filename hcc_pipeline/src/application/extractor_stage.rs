//! # Extractor Stage
//!
//! Consumes `document.uploaded`, runs §4.4.1's seven steps, and emits
//! `document.extraction.completed`. The only stage that reads the original
//! document bytes rather than a prior-stage artifact.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use hcc_domain::entities::document::DocumentStatus;
use hcc_domain::events::{DocumentUploadedPayload, Envelope, ExtractionCompletedPayload, StageMessage};
use hcc_domain::repositories::artifact_store::store_json;
use hcc_domain::repositories::document_registry::ResultsUpdate;
use hcc_domain::repositories::llm_client::GenerationParams;
use hcc_domain::repositories::{ArtifactStore, DocumentRegistry, HccReferenceProvider, LlmClient, MessageBus};
use hcc_domain::services::extraction::{extract_assessment_plan_section, extract_rule_based_conditions, parse_clinical_metadata};
use hcc_domain::value_objects::{DocumentId, StorageKind};
use hcc_domain::{HccError, Result};

use crate::application::artifacts::{ExtractionArtifact, ExtractionMetadata};
use crate::application::llm_support::{extraction_prompt, tolerant_parse_conditions};
use crate::application::stage_runner::StageHandler;

pub struct ExtractorStage {
    registry: Arc<dyn DocumentRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<dyn MessageBus>,
    llm: Arc<dyn LlmClient>,
    hcc: Arc<dyn HccReferenceProvider>,
}

impl ExtractorStage {
    pub fn new(
        registry: Arc<dyn DocumentRegistry>,
        artifacts: Arc<dyn ArtifactStore>,
        bus: Arc<dyn MessageBus>,
        llm: Arc<dyn LlmClient>,
        hcc: Arc<dyn HccReferenceProvider>,
    ) -> Self {
        Self {
            registry,
            artifacts,
            bus,
            llm,
            hcc,
        }
    }

    async fn load_document_text(&self, payload: &DocumentUploadedPayload) -> Result<String> {
        if let Some(inline) = &payload.document_content {
            return Ok(inline.clone());
        }
        let object = self.artifacts.get(&payload.storage_path).await?;
        String::from_utf8(object.bytes).map_err(|e| HccError::ArtifactStore(format!("document is not valid UTF-8: {e}")))
    }
}

#[async_trait]
impl StageHandler for ExtractorStage {
    type Parsed = DocumentUploadedPayload;

    fn queue(&self) -> &'static str {
        StageMessage::ROUTING_DOCUMENT_UPLOADED
    }

    fn in_progress_status(&self) -> DocumentStatus {
        DocumentStatus::Extracting
    }

    fn registry(&self) -> &Arc<dyn DocumentRegistry> {
        &self.registry
    }

    fn parse(&self, payload: Value) -> Result<Option<Self::Parsed>> {
        let message: StageMessage = match serde_json::from_value(payload) {
            Ok(m) => m,
            Err(e) => return Err(HccError::InvalidMessage(format!("could not parse envelope: {e}"))),
        };
        match message {
            StageMessage::DocumentUploaded(payload) => Ok(Some(payload)),
            StageMessage::Unknown => Ok(None),
            other => {
                tracing::warn!(routing_key = other.routing_key(), "unexpected message_type on extraction queue");
                Ok(None)
            }
        }
    }

    fn document_id(&self, parsed: &Self::Parsed) -> DocumentId {
        DocumentId::from_uuid(parsed.envelope.document_id)
    }

    async fn run(&self, payload: Self::Parsed) -> Result<()> {
        let document_id = DocumentId::from_uuid(payload.envelope.document_id);
        let mut errors: Vec<String> = Vec::new();

        let text = self.load_document_text(&payload).await?;

        // Step 1-2: clinical metadata + Assessment/Plan section.
        let clinical_metadata = parse_clinical_metadata(&text);
        let section = extract_assessment_plan_section(&text);

        // Step 3: rule-based conditions.
        let mut rule_based = section.as_deref().map(extract_rule_based_conditions).unwrap_or_default();

        // Step 4: LLM-assisted extraction. Never fatal.
        let llm_conditions = match self.llm.complete(&extraction_prompt(&text), GenerationParams::default()).await {
            Ok(completion) => tolerant_parse_conditions(&completion).into_conditions(),
            Err(e) => {
                errors.push(format!("llm_failed: {e}"));
                Vec::new()
            }
        };

        // Step 5: merge by lower-cased name. `rule_based_count` is fixed
        // before this loop runs: every condition already in the list stays
        // in it (a name match only annotates it), so this count can't be
        // derived afterwards by subtracting the LLM's raw result count —
        // an LLM condition that matches an existing one contributes to
        // neither `total_conditions - rule_based_count` nor a pushed entry.
        let rule_based_count = rule_based.len() as u32;
        let mut llm_based_count = 0u32;
        for (idx, llm_condition) in llm_conditions.iter().enumerate() {
            let llm_name = llm_condition.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let llm_confidence = llm_condition.get("confidence").and_then(|v| v.as_f64());

            match rule_based.iter_mut().find(|c| c.name.eq_ignore_ascii_case(llm_name)) {
                Some(existing) => {
                    existing.metadata.insert("also_found_by_llm".to_string(), Value::Bool(true));
                    if let Some(confidence) = llm_confidence {
                        existing.metadata.insert("llm_confidence".to_string(), serde_json::json!(confidence));
                    }
                }
                None => {
                    let mut condition: hcc_domain::entities::Condition =
                        serde_json::from_value(llm_condition.clone()).unwrap_or_else(|_| {
                            let mut c = hcc_domain::entities::Condition::new(format!("llm-{idx}"), llm_name.to_string());
                            c.confidence = llm_confidence.unwrap_or(0.5);
                            c
                        });
                    condition.metadata.insert("extraction_method".to_string(), Value::String("llm_only".to_string()));
                    rule_based.push(condition);
                    llm_based_count += 1;
                }
            }
        }

        // Step 6: normalize ICD code pairs.
        for condition in rule_based.iter_mut() {
            condition.normalize_icd();
        }

        // Step 7: HCC pre-tag.
        let hcc = self.hcc.current();
        for condition in rule_based.iter_mut() {
            let code = condition.icd_code.as_deref().or(condition.icd_code_no_dot.as_deref());
            let relevant = code.map(|c| hcc.is_hcc_relevant(c)).unwrap_or(false);
            condition.metadata.insert("is_hcc_relevant".to_string(), Value::Bool(relevant));
        }

        let total_conditions = rule_based.len() as u32;

        let artifact = ExtractionArtifact {
            document_id: document_id.as_uuid(),
            conditions: rule_based,
            metadata: ExtractionMetadata {
                source: "hcc-extractor".to_string(),
                total_conditions,
                rule_based_count,
                llm_based_count,
                extraction_method: "rule_based+llm".to_string(),
                errors,
            },
        };

        let path = store_json(self.artifacts.as_ref(), &artifact, "extraction.json").await?;

        self.registry
            .update_results(
                document_id,
                ResultsUpdate {
                    total_conditions: Some(total_conditions),
                    extraction_result_path: Some(path.clone()),
                    patient_info: Some(serde_json::json!({
                        "patient_name": clinical_metadata.patient_name,
                        "patient_id": clinical_metadata.patient_id,
                        "age": clinical_metadata.age,
                        "gender": clinical_metadata.gender,
                        "dob": clinical_metadata.dob,
                        "provider": clinical_metadata.provider,
                        "appointment_date": clinical_metadata.appointment_date,
                        "chief_complaint": clinical_metadata.chief_complaint,
                    })),
                    ..Default::default()
                },
            )
            .await?;

        let next = StageMessage::ExtractionCompleted(ExtractionCompletedPayload {
            envelope: Envelope::new(document_id.as_uuid()),
            extraction_result_path: path,
            total_conditions,
        });
        publish(self.bus.as_ref(), &next, payload.priority).await
    }
}

async fn publish(bus: &dyn MessageBus, message: &StageMessage, priority: bool) -> Result<()> {
    let routing_key = message.routing_key();
    let payload = serde_json::to_value(message).map_err(HccError::from)?;
    bus.publish(routing_key, payload, priority).await
}

/// Used by batch mode and the gateway's upload path to construct the
/// initial `document.uploaded` message.
pub fn document_uploaded_message(
    document_id: Uuid,
    storage_path: String,
    storage_type: StorageKind,
    content_type: String,
    document_content: Option<String>,
    priority: bool,
) -> StageMessage {
    StageMessage::DocumentUploaded(DocumentUploadedPayload {
        envelope: Envelope::new(document_id),
        storage_path,
        storage_type: storage_type.as_str().to_string(),
        content_type,
        document_content,
        priority,
    })
}

//! # Analyzer Stage
//!
//! Consumes `document.extraction.completed`, runs §4.4.2's five-step graph,
//! and emits `document.analysis.completed`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use hcc_domain::entities::document::DocumentStatus;
use hcc_domain::entities::Condition;
use hcc_domain::events::{AnalysisCompletedPayload, Envelope, ExtractionCompletedPayload, StageMessage};
use hcc_domain::repositories::artifact_store::store_json;
use hcc_domain::repositories::document_registry::ResultsUpdate;
use hcc_domain::repositories::llm_client::GenerationParams;
use hcc_domain::repositories::{ArtifactStore, DocumentRegistry, HccReferenceProvider, LlmClient, MessageBus};
use hcc_domain::value_objects::DocumentId;
use hcc_domain::{HccError, Result};

use crate::application::artifacts::{AnalysisArtifact, AnalysisMetadata, ExtractionArtifact};
use crate::application::llm_support::{analysis_prompt, tolerant_parse_conditions};
use crate::application::stage_runner::StageHandler;

/// The LLM enrichment sample is capped at 50 reference entries (§4.4.2
/// step 4).
const HCC_SAMPLE_SIZE: usize = 50;

/// Conditions whose rule-based confidence already clears this bar skip
/// LLM enrichment entirely (§4.4.2 step 4).
const SKIP_ENRICHMENT_CONFIDENCE: f64 = 0.9;

pub struct AnalyzerStage {
    registry: Arc<dyn DocumentRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<dyn MessageBus>,
    llm: Arc<dyn LlmClient>,
    hcc: Arc<dyn HccReferenceProvider>,
}

impl AnalyzerStage {
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
}

#[async_trait]
impl StageHandler for AnalyzerStage {
    type Parsed = ExtractionCompletedPayload;

    fn queue(&self) -> &'static str {
        StageMessage::ROUTING_EXTRACTION_COMPLETED
    }

    fn in_progress_status(&self) -> DocumentStatus {
        DocumentStatus::Analyzing
    }

    fn registry(&self) -> &Arc<dyn DocumentRegistry> {
        &self.registry
    }

    fn parse(&self, payload: Value) -> Result<Option<Self::Parsed>> {
        let message: StageMessage = serde_json::from_value(payload).map_err(|e| HccError::InvalidMessage(format!("could not parse envelope: {e}")))?;
        match message {
            StageMessage::ExtractionCompleted(payload) => Ok(Some(payload)),
            StageMessage::Unknown => Ok(None),
            other => {
                tracing::warn!(routing_key = other.routing_key(), "unexpected message_type on analysis queue");
                Ok(None)
            }
        }
    }

    fn document_id(&self, parsed: &Self::Parsed) -> DocumentId {
        DocumentId::from_uuid(parsed.envelope.document_id)
    }

    async fn run(&self, payload: Self::Parsed) -> Result<()> {
        let document_id = DocumentId::from_uuid(payload.envelope.document_id);

        // Step 1: HCC codes are already loaded and cached behind the port.
        let hcc = self.hcc.current();

        // Step 2: prepare.
        let extraction: ExtractionArtifact = {
            let stored = self.artifacts.get(&payload.extraction_result_path).await?;
            serde_json::from_slice(&stored.bytes).map_err(|e| HccError::ArtifactStore(format!("could not parse extraction artifact: {e}")))?
        };
        let mut conditions = extraction.conditions;
        let mut errors: Vec<String> = Vec::new();
        if conditions.is_empty() {
            errors.push("no_conditions: extraction produced zero conditions".to_string());
        }

        // Step 3: rule-based HCC determination.
        for condition in conditions.iter_mut() {
            let code = condition.icd_code_no_dot.clone().or_else(|| condition.icd_code.clone());
            let lookup_code = condition.icd_code.as_deref().or(condition.icd_code_no_dot.as_deref());
            match lookup_code.and_then(|c| hcc.get(c)) {
                Some(entry) => {
                    condition.hcc_relevant = Some(true);
                    condition.hcc_code = code;
                    condition.hcc_category = Some(entry.category.clone());
                    condition.confidence = 1.0;
                    condition.reasoning = Some(format!("Direct match with HCC-relevant code: {}", lookup_code.unwrap_or_default()));
                }
                None => {
                    condition.hcc_relevant = Some(false);
                    condition.confidence = 0.8;
                    condition.reasoning = Some("No exact match against the HCC reference table".to_string());
                }
            }
        }

        // Step 4: LLM enrichment, unless every condition already clears the bar.
        let all_high_confidence = conditions.iter().all(|c| c.confidence >= SKIP_ENRICHMENT_CONFIDENCE);
        if !all_high_confidence {
            let conditions_json = serde_json::to_value(&conditions).map_err(HccError::from)?;
            let sample_json = serde_json::to_value(hcc.sample(HCC_SAMPLE_SIZE)).map_err(HccError::from)?;

            match self.llm.complete(&analysis_prompt(&conditions_json, &sample_json), GenerationParams::default()).await {
                Ok(completion) => {
                    let opinions = tolerant_parse_conditions(&completion).into_conditions();
                    apply_llm_opinions(&mut conditions, opinions);
                }
                Err(e) => {
                    errors.push(format!("llm_failed: {e}"));
                    for condition in conditions.iter_mut() {
                        condition.metadata.insert("analysis_source".to_string(), Value::String("rule_based".to_string()));
                    }
                }
            }
        }

        // Step 5: finalize aggregates. NaN sanitization happens implicitly:
        // every confidence value assigned above is a finite literal, and
        // any LLM-sourced confidence went through the NaN-token sanitizer
        // in `tolerant_parse_conditions` before reaching here.
        let total_conditions = conditions.len() as u32;
        let hcc_relevant_count = conditions.iter().filter(|c| c.hcc_relevant == Some(true)).count() as u32;
        let high_confidence_count = conditions.iter().filter(|c| c.confidence >= SKIP_ENRICHMENT_CONFIDENCE).count() as u32;
        let mean_confidence = if conditions.is_empty() {
            None
        } else {
            Some(conditions.iter().map(|c| c.confidence).sum::<f64>() / conditions.len() as f64)
        };

        let artifact = AnalysisArtifact {
            document_id: document_id.as_uuid(),
            conditions,
            metadata: AnalysisMetadata {
                total_conditions,
                hcc_relevant_count,
                high_confidence_count,
                mean_confidence,
                error_count: errors.len() as u32,
                analysis_source: if all_high_confidence { "rule_based".to_string() } else { "rule_based+llm".to_string() },
            },
            errors,
        };

        let path = store_json(self.artifacts.as_ref(), &artifact, "analysis.json").await?;

        self.registry
            .update_results(
                document_id,
                ResultsUpdate {
                    hcc_relevant_conditions: Some(hcc_relevant_count),
                    analysis_result_path: Some(path.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let next = StageMessage::AnalysisCompleted(AnalysisCompletedPayload {
            envelope: Envelope::new(document_id.as_uuid()),
            analysis_result_path: path,
            hcc_relevant_conditions: hcc_relevant_count,
        });
        publish(self.bus.as_ref(), &next).await
    }
}

/// Merges LLM-returned opinions into `conditions` by matching `id`.
/// Overwrites the rule-based HCC fields only when the LLM is strictly more
/// confident; otherwise attaches the opinion as metadata (§4.4.2 step 4).
fn apply_llm_opinions(conditions: &mut [Condition], opinions: Vec<Value>) {
    for opinion in opinions {
        let Some(id) = opinion.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(condition) = conditions.iter_mut().find(|c| c.id == id) else {
            continue;
        };

        let llm_confidence = opinion.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let llm_relevant = opinion.get("hcc_relevant").and_then(|v| v.as_bool());
        let llm_code = opinion.get("hcc_code").and_then(|v| v.as_str()).map(str::to_string);
        let llm_category = opinion.get("hcc_category").and_then(|v| v.as_str()).map(str::to_string);
        let llm_reasoning = opinion.get("reasoning").and_then(|v| v.as_str()).map(str::to_string);

        if llm_confidence > condition.confidence {
            condition.hcc_relevant = llm_relevant.or(condition.hcc_relevant);
            condition.hcc_code = llm_code.or_else(|| condition.hcc_code.clone());
            condition.hcc_category = llm_category.or_else(|| condition.hcc_category.clone());
            condition.confidence = llm_confidence;
            condition.reasoning = llm_reasoning.or_else(|| condition.reasoning.clone());
            condition.metadata.insert("analysis_source".to_string(), Value::String("llm".to_string()));
        } else {
            condition.metadata.insert("llm_hcc_relevant".to_string(), llm_relevant.map(Value::Bool).unwrap_or(Value::Null));
            condition.metadata.insert("llm_confidence".to_string(), serde_json::json!(llm_confidence));
            condition
                .metadata
                .insert("llm_reasoning".to_string(), llm_reasoning.map(Value::String).unwrap_or(Value::Null));
            condition.metadata.insert("analysis_source".to_string(), Value::String("rule_based".to_string()));
        }
    }
}

async fn publish(bus: &dyn MessageBus, message: &StageMessage) -> Result<()> {
    let routing_key = message.routing_key();
    let payload = serde_json::to_value(message).map_err(HccError::from)?;
    bus.publish(routing_key, payload, false).await
}

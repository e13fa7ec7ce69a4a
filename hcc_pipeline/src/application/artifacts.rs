//! # Stage Artifact Shapes
//!
//! The JSON documents each stage stores via `ArtifactStore::store_json`
//! and the next stage loads back, per §4.4's per-stage "Artifact:" lines.
//! Each is a thin wrapper of `document_id` + `conditions` + stage-specific
//! `metadata`, kept as explicit structs (rather than a generic
//! `serde_json::Value` bag) so a downstream stage's `Get(...)` failing to
//! parse is a `serde_json::Error` caught at the boundary, not a silent
//! `None`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hcc_domain::entities::Condition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub source: String,
    pub total_conditions: u32,
    pub rule_based_count: u32,
    pub llm_based_count: u32,
    pub extraction_method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionArtifact {
    pub document_id: Uuid,
    pub conditions: Vec<Condition>,
    pub metadata: ExtractionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub total_conditions: u32,
    pub hcc_relevant_count: u32,
    pub high_confidence_count: u32,
    pub mean_confidence: Option<f64>,
    pub error_count: u32,
    pub analysis_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub document_id: Uuid,
    pub conditions: Vec<Condition>,
    pub metadata: AnalysisMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetadata {
    #[serde(flatten)]
    pub analysis_metadata: AnalysisMetadata,
    pub total_conditions: u32,
    pub compliant_conditions: u32,
    pub non_compliant_conditions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationArtifact {
    pub document_id: Uuid,
    pub conditions: Vec<Condition>,
    pub metadata: ValidationMetadata,
}

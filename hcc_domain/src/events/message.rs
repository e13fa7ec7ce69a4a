//! # Stage Messages
//!
//! Wire format for messages carried on the durable topic exchange (§6.2).
//! `message_type` is a JSON discriminator; unknown values decode into
//! `StageMessage::Unknown` rather than failing deserialization, per the
//! redesign note on dynamic, string-keyed messages — forward compatibility
//! with future message types is a property of the wire format, not
//! something stage workers special-case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields present on every stage message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: Uuid,
    pub timestamp: i64,
    pub document_id: Uuid,
}

impl Envelope {
    pub fn new(document_id: Uuid) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now().timestamp(),
            document_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUploadedPayload {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub storage_path: String,
    pub storage_type: String,
    pub content_type: String,
    #[serde(default)]
    pub document_content: Option<String>,
    #[serde(default)]
    pub priority: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionCompletedPayload {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub extraction_result_path: String,
    pub total_conditions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCompletedPayload {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub analysis_result_path: String,
    pub hcc_relevant_conditions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCompletedPayload {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub validation_result_path: String,
    pub compliant_conditions: u32,
    pub total_conditions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub error_type: String,
    pub error_message: String,
    pub stage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum StageMessage {
    #[serde(rename = "document.uploaded")]
    DocumentUploaded(DocumentUploadedPayload),
    #[serde(rename = "document.extraction.completed")]
    ExtractionCompleted(ExtractionCompletedPayload),
    #[serde(rename = "document.analysis.completed")]
    AnalysisCompleted(AnalysisCompletedPayload),
    #[serde(rename = "document.validation.completed")]
    ValidationCompleted(ValidationCompletedPayload),
    #[serde(rename = "document.error")]
    Error(ErrorPayload),
    /// Any `message_type` this crate doesn't recognize. Stage handlers log
    /// and ack (drop) these; they are never a reason to fail a document.
    #[serde(other)]
    Unknown,
}

impl StageMessage {
    pub const ROUTING_DOCUMENT_UPLOADED: &'static str = "document.uploaded";
    pub const ROUTING_EXTRACTION_COMPLETED: &'static str = "document.extraction.completed";
    pub const ROUTING_ANALYSIS_COMPLETED: &'static str = "document.analysis.completed";
    pub const ROUTING_VALIDATION_COMPLETED: &'static str = "document.validation.completed";
    pub const ROUTING_ERROR: &'static str = "document.error";

    pub fn document_id(&self) -> Option<Uuid> {
        match self {
            StageMessage::DocumentUploaded(p) => Some(p.envelope.document_id),
            StageMessage::ExtractionCompleted(p) => Some(p.envelope.document_id),
            StageMessage::AnalysisCompleted(p) => Some(p.envelope.document_id),
            StageMessage::ValidationCompleted(p) => Some(p.envelope.document_id),
            StageMessage::Error(p) => Some(p.envelope.document_id),
            StageMessage::Unknown => None,
        }
    }

    pub fn routing_key(&self) -> &'static str {
        match self {
            StageMessage::DocumentUploaded(_) => Self::ROUTING_DOCUMENT_UPLOADED,
            StageMessage::ExtractionCompleted(_) => Self::ROUTING_EXTRACTION_COMPLETED,
            StageMessage::AnalysisCompleted(_) => Self::ROUTING_ANALYSIS_COMPLETED,
            StageMessage::ValidationCompleted(_) => Self::ROUTING_VALIDATION_COMPLETED,
            StageMessage::Error(_) => Self::ROUTING_ERROR,
            StageMessage::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_message_type_does_not_fail_to_parse() {
        let raw = serde_json::json!({
            "message_type": "document.something_future",
            "message_id": Uuid::new_v4(),
            "timestamp": 0,
            "document_id": Uuid::new_v4(),
        });
        let parsed: StageMessage = serde_json::from_value(raw).expect("unknown variants must not fail to parse");
        assert!(matches!(parsed, StageMessage::Unknown));
    }

    #[test]
    fn roundtrips_document_uploaded() {
        let doc_id = Uuid::new_v4();
        let msg = StageMessage::DocumentUploaded(DocumentUploadedPayload {
            envelope: Envelope::new(doc_id),
            storage_path: "abc/note.txt".to_string(),
            storage_type: "local".to_string(),
            content_type: "text/plain".to_string(),
            document_content: None,
            priority: false,
        });
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: StageMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.document_id(), Some(doc_id));
        assert_eq!(parsed.routing_key(), StageMessage::ROUTING_DOCUMENT_UPLOADED);
    }
}

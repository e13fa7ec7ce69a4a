//! # Document
//!
//! The durable record of a document's processing state. `Document` is owned
//! exclusively by the registry; every other component (artifacts, messages)
//! derives from it. Mutation happens only through the state-machine methods
//! below, never by constructing a new `Document` with arbitrary field
//! values — that keeps the forward-only status invariant enforceable in one
//! place instead of at every call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::HccError;
use crate::value_objects::{DocumentId, StorageLocation};

/// Processing status. Transitions only move forward along
/// `Pending -> Extracting -> Analyzing -> Validating -> Completed`, or to
/// `Failed` from any non-terminal state. The explicit Reprocess operation is
/// the only backward transition, and it is modeled as a distinct method
/// rather than a transition the state machine itself allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Pending,
    Extracting,
    Analyzing,
    Validating,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// The registry persists status as the uppercase variant name.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Extracting => "EXTRACTING",
            DocumentStatus::Analyzing => "ANALYZING",
            DocumentStatus::Validating => "VALIDATING",
            DocumentStatus::Completed => "COMPLETED",
            DocumentStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(DocumentStatus::Pending),
            "EXTRACTING" => Some(DocumentStatus::Extracting),
            "ANALYZING" => Some(DocumentStatus::Analyzing),
            "VALIDATING" => Some(DocumentStatus::Validating),
            "COMPLETED" => Some(DocumentStatus::Completed),
            "FAILED" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }

    fn ordinal(&self) -> u8 {
        match self {
            DocumentStatus::Pending => 0,
            DocumentStatus::Extracting => 1,
            DocumentStatus::Analyzing => 2,
            DocumentStatus::Validating => 3,
            DocumentStatus::Completed => 4,
            DocumentStatus::Failed => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    /// True if `self -> next` is a legal forward transition (or a move to
    /// `Failed`, which is legal from any non-terminal state). Does not
    /// account for Reprocess, which is a separate operation.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        if next == DocumentStatus::Failed {
            return !self.is_terminal();
        }
        !self.is_terminal() && next.ordinal() == self.ordinal() + 1
    }
}

/// Open key/value metadata. Values are arbitrary JSON so both stage
/// workers and the gateway can stash provenance without a schema migration.
pub type Metadata = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub file_size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub storage: StorageLocation,

    pub status: DocumentStatus,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,

    pub total_conditions: Option<u32>,
    pub hcc_relevant_conditions: Option<u32>,
    pub compliant_conditions: Option<u32>,

    pub extraction_result_path: Option<String>,
    pub analysis_result_path: Option<String>,
    pub validation_result_path: Option<String>,

    pub errors: Option<String>,
    pub patient_info: Option<serde_json::Value>,
    pub metadata: Metadata,

    pub owner_id: Option<String>,
}

impl Document {
    /// Constructs a new, unpersisted document in `Pending` status. The
    /// registry assigns `created_at`/`updated_at` on insert; this
    /// constructor stamps them too so in-memory and test collaborators
    /// behave the same as the real adapter.
    pub fn new(filename: String, file_size: u64, content_type: String, storage: StorageLocation, owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: DocumentId::new(),
            filename,
            file_size,
            content_type,
            created_at: now,
            updated_at: now,
            storage,
            status: DocumentStatus::Pending,
            processing_started_at: None,
            processing_completed_at: None,
            total_conditions: None,
            hcc_relevant_conditions: None,
            compliant_conditions: None,
            extraction_result_path: None,
            analysis_result_path: None,
            validation_result_path: None,
            errors: None,
            patient_info: None,
            metadata: Metadata::new(),
            owner_id,
        }
    }

    /// Validates that a caller may read or mutate this document: a non-null
    /// owner restricts access to that owner unless the caller is a
    /// superuser.
    pub fn is_accessible_by(&self, caller_id: Option<&str>, is_superuser: bool) -> bool {
        if is_superuser {
            return true;
        }
        match &self.owner_id {
            None => true,
            Some(owner) => caller_id == Some(owner.as_str()),
        }
    }

    /// Applies a forward status transition (or a move to `Failed`),
    /// stamping `processing_started_at` on first leave of `Pending` and
    /// `processing_completed_at` on entering a terminal state.
    pub fn transition_to(&mut self, next: DocumentStatus, errors: Option<String>) -> Result<(), HccError> {
        if !self.status.can_transition_to(next) {
            return Err(HccError::InvalidTransition {
                from: self.status.as_db_str().to_string(),
                to: next.as_db_str().to_string(),
            });
        }

        if self.status == DocumentStatus::Pending && next != DocumentStatus::Pending {
            self.processing_started_at.get_or_insert(Utc::now());
        }
        if next.is_terminal() {
            self.processing_completed_at = Some(Utc::now());
        }
        if let Some(e) = errors {
            self.errors = Some(e);
        }

        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Administrative reset: returns the document to `Pending`, nulling the
    /// three result paths and three counters. Legal from any status,
    /// including terminal ones — this is the one explicit backward
    /// transition the state machine allows.
    pub fn reprocess(&mut self) {
        self.status = DocumentStatus::Pending;
        self.processing_started_at = None;
        self.processing_completed_at = None;
        self.total_conditions = None;
        self.hcc_relevant_conditions = None;
        self.compliant_conditions = None;
        self.extraction_result_path = None;
        self.analysis_result_path = None;
        self.validation_result_path = None;
        self.errors = None;
        self.updated_at = Utc::now();
    }

    /// Shallow merge of new metadata keys over existing ones, last-writer-
    /// wins per key, as specified for `UpdateResults`.
    pub fn merge_metadata(&mut self, incoming: Metadata) {
        for (k, v) in incoming {
            self.metadata.insert(k, v);
        }
    }

    /// `hcc_relevant_conditions <= total_conditions` and
    /// `compliant_conditions <= total_conditions`, once both sides of each
    /// comparison are known. Used in tests and as a defensive check before
    /// persisting `UpdateResults`.
    pub fn counters_conserved(&self) -> bool {
        let total = self.total_conditions.unwrap_or(u32::MAX);
        let hcc_ok = self.hcc_relevant_conditions.map(|h| h <= total).unwrap_or(true);
        let compliant_ok = self.compliant_conditions.map(|c| c <= total).unwrap_or(true);
        hcc_ok && compliant_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::StorageKind;

    fn new_doc() -> Document {
        Document::new(
            "note.txt".to_string(),
            100,
            "text/plain".to_string(),
            StorageLocation::new(StorageKind::Local, "abc/note.txt"),
            None,
        )
    }

    #[test]
    fn forward_transitions_are_legal() {
        let mut doc = new_doc();
        doc.transition_to(DocumentStatus::Extracting, None).unwrap();
        assert_eq!(doc.status, DocumentStatus::Extracting);
        assert!(doc.processing_started_at.is_some());
        doc.transition_to(DocumentStatus::Analyzing, None).unwrap();
        doc.transition_to(DocumentStatus::Validating, None).unwrap();
        doc.transition_to(DocumentStatus::Completed, None).unwrap();
        assert!(doc.processing_completed_at.is_some());
    }

    #[test]
    fn cannot_skip_a_stage() {
        let mut doc = new_doc();
        let err = doc.transition_to(DocumentStatus::Analyzing, None).unwrap_err();
        assert!(matches!(err, HccError::InvalidTransition { .. }));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        for start in [
            DocumentStatus::Pending,
            DocumentStatus::Extracting,
            DocumentStatus::Analyzing,
            DocumentStatus::Validating,
        ] {
            let mut doc = new_doc();
            doc.status = start;
            doc.transition_to(DocumentStatus::Failed, Some("boom".to_string())).unwrap();
            assert_eq!(doc.status, DocumentStatus::Failed);
        }
    }

    #[test]
    fn cannot_transition_out_of_terminal_state() {
        let mut doc = new_doc();
        doc.status = DocumentStatus::Completed;
        assert!(doc.transition_to(DocumentStatus::Failed, None).is_err());
    }

    #[test]
    fn reprocess_resets_counters_and_paths() {
        let mut doc = new_doc();
        doc.status = DocumentStatus::Completed;
        doc.total_conditions = Some(3);
        doc.hcc_relevant_conditions = Some(2);
        doc.extraction_result_path = Some("x/e.json".to_string());
        doc.reprocess();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(doc.total_conditions.is_none());
        assert!(doc.extraction_result_path.is_none());
    }

    #[test]
    fn owner_restricts_access_unless_superuser() {
        let mut doc = new_doc();
        doc.owner_id = Some("alice".to_string());
        assert!(doc.is_accessible_by(Some("alice"), false));
        assert!(!doc.is_accessible_by(Some("bob"), false));
        assert!(doc.is_accessible_by(Some("bob"), true));
    }
}

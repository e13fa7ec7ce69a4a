//! # Condition
//!
//! A medical condition extracted from a document's Assessment/Plan section.
//! Conditions are embedded inside stage artifacts — they are never a
//! registry row. A condition's `id` is assigned once, at extraction time,
//! and is stable across every later stage: analyzer and validator mutate
//! fields but never re-assign ids (§3 invariant).
//!
//! Validation is modeled as composition rather than inheritance: a
//! `ValidationRuleResult` references its rule by id and is attached to the
//! condition it was evaluated against, instead of a validated subclass of
//! `Condition` carrying extra fields by construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ConditionMetadata = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    pub name: String,

    pub icd_code: Option<String>,
    pub icd_code_no_dot: Option<String>,
    pub icd_description: Option<String>,
    pub details: Option<String>,
    pub status: Option<String>,
    pub confidence: f64,

    pub hcc_relevant: Option<bool>,
    pub hcc_code: Option<String>,
    pub hcc_category: Option<String>,
    pub reasoning: Option<String>,

    #[serde(default)]
    pub metadata: ConditionMetadata,

    /// Set only by the Validator.
    pub is_compliant: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_results: Vec<ValidationRuleResult>,
}

impl Condition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icd_code: None,
            icd_code_no_dot: None,
            icd_description: None,
            details: None,
            status: None,
            confidence: 0.0,
            hcc_relevant: None,
            hcc_code: None,
            hcc_category: None,
            reasoning: None,
            metadata: ConditionMetadata::new(),
            is_compliant: None,
            validation_results: Vec::new(),
        }
    }

    /// Ensures both `icd_code` and `icd_code_no_dot` are populated when
    /// either is known, per §4.4.1 step 6.
    pub fn normalize_icd(&mut self) {
        crate::value_objects::icd_code::normalize_pair(&mut self.icd_code, &mut self.icd_code_no_dot);
    }
}

/// The outcome of one rule evaluated against one condition. New rules
/// register by `(id, description, predicate)`; unknown rule ids appearing
/// in serialized input are preserved verbatim rather than rejected, so a
/// reader deserializing `Vec<ValidationRuleResult>` never loses information
/// about rules it doesn't recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRuleResult {
    pub rule_id: String,
    pub description: String,
    pub passed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fills_no_dot_variant() {
        let mut c = Condition::new("1", "Type 2 diabetes");
        c.icd_code = Some("E11.9".to_string());
        c.normalize_icd();
        assert_eq!(c.icd_code_no_dot.as_deref(), Some("E119"));
    }
}

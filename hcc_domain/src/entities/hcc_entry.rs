//! Reference data entity: one row of the HCC-relevant code table. Read-only
//! from the pipeline's perspective — the only writer is the HCC Reference
//! component's CSV loader.

use serde::{Deserialize, Serialize};

pub const UNCATEGORIZED: &str = "UNCATEGORIZED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HccEntry {
    /// Dotted ICD-10 code as it appears in the reference CSV, e.g. `E11.9`.
    pub icd_code: String,
    pub description: String,
    /// Tag string, e.g. `HCC19`. Missing or NaN becomes `"UNCATEGORIZED"`.
    pub category: String,
}

impl HccEntry {
    pub fn new(icd_code: impl Into<String>, description: impl Into<String>, category: Option<String>) -> Self {
        let category = match category {
            Some(c) if !c.trim().is_empty() && !c.trim().eq_ignore_ascii_case("nan") => c.trim().to_string(),
            _ => UNCATEGORIZED.to_string(),
        };
        Self {
            icd_code: icd_code.into(),
            description: description.into(),
            category,
        }
    }
}

//! # HCC Lookup Snapshot
//!
//! The in-process cached lookup from an ICD-10 code to its
//! [`HccEntry`](crate::entities::HccEntry), described in §4.5. This module
//! holds only the pure, in-memory half of that component: given a snapshot
//! of reference rows, answer `is_hcc_relevant`, `get`, and `categories`.
//!
//! Loading the CSV, the one-hour TTL, and the atomic pointer swap between
//! snapshots are infrastructure concerns (a process-scoped holder around
//! `arc_swap::ArcSwap<HccLookup>` or an equivalent), since they require
//! file I/O and a clock. This type is what gets swapped in.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::entities::HccEntry;
use crate::value_objects::icd_code::strip_dot;

/// An immutable snapshot of the HCC-relevant code table, keyed both by
/// dotted and undotted ICD-10 form. Building a `HccLookup` never fails —
/// malformed rows are simply rows whose fields are all best-effort
/// whitespace-stripped strings, per §4.5 and §6.4 ("no header
/// normalization beyond whitespace strip").
#[derive(Debug, Clone, Default)]
pub struct HccLookup {
    by_dotted: HashMap<String, HccEntry>,
    by_undotted: HashMap<String, HccEntry>,
}

impl HccLookup {
    /// Builds a snapshot from reference rows. Later rows with a
    /// already-seen code overwrite earlier ones, matching the last-row-wins
    /// behavior of loading a CSV into a dict keyed by code.
    pub fn from_entries(entries: impl IntoIterator<Item = HccEntry>) -> Self {
        let mut by_dotted = HashMap::new();
        let mut by_undotted = HashMap::new();
        for entry in entries {
            let undotted = strip_dot(&entry.icd_code);
            by_undotted.insert(undotted, entry.clone());
            by_dotted.insert(entry.icd_code.trim().to_string(), entry);
        }
        Self { by_dotted, by_undotted }
    }

    pub fn len(&self) -> usize {
        self.by_undotted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_undotted.is_empty()
    }

    /// True iff `code` (accepted dotted or undotted) is a key in the
    /// reference table. §8 property 5 requires this to agree for a code
    /// and its dot-stripped form, which holds here because both forms
    /// normalize to the same undotted lookup key.
    pub fn is_hcc_relevant(&self, code: &str) -> bool {
        self.by_undotted.contains_key(&strip_dot(code))
    }

    /// Looks up the entry for a code, trying the undotted form first (the
    /// canonical key) and falling back to the dotted form so callers that
    /// only have the original dotted string still resolve.
    pub fn get(&self, code: &str) -> Option<&HccEntry> {
        self.by_undotted
            .get(&strip_dot(code))
            .or_else(|| self.by_dotted.get(code.trim()))
    }

    /// Sorted unique category tags with a per-tag code count, per §4.5.
    pub fn categories(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in self.by_undotted.values() {
            *counts.entry(entry.category.clone()).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    /// Up to `n` entries, used by the Analyzer to cap the reference sample
    /// sent to the LLM (§4.4.2 step 4: "a size-capped sample of HCC
    /// entries (≤ 50)"). Iteration order over a `HashMap` isn't
    /// meaningful, but the cap is advisory context for the LLM, not a
    /// deterministic contract.
    pub fn sample(&self, n: usize) -> Vec<HccEntry> {
        self.by_undotted.values().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> HccLookup {
        HccLookup::from_entries([
            HccEntry::new("E11.9", "Type 2 diabetes mellitus without complications", Some("HCC19".to_string())),
            HccEntry::new("I10", "Essential hypertension", None),
        ])
    }

    #[test]
    fn dot_form_equivalence() {
        let l = lookup();
        assert_eq!(l.is_hcc_relevant("E11.9"), l.is_hcc_relevant("E119"));
        assert!(l.is_hcc_relevant("E11.9"));
        assert!(l.is_hcc_relevant("E119"));
    }

    #[test]
    fn missing_category_becomes_uncategorized() {
        let l = lookup();
        assert_eq!(l.get("I10").unwrap().category, "UNCATEGORIZED");
    }

    #[test]
    fn unknown_code_is_not_relevant() {
        let l = lookup();
        assert!(!l.is_hcc_relevant("Z99.9"));
        assert!(l.get("Z99.9").is_none());
    }

    #[test]
    fn categories_are_sorted_and_counted() {
        let l = HccLookup::from_entries([
            HccEntry::new("E11.9", "d1", Some("HCC19".to_string())),
            HccEntry::new("E11.8", "d2", Some("HCC19".to_string())),
            HccEntry::new("I10", "d3", Some("HCC85".to_string())),
        ]);
        assert_eq!(l.categories(), vec![("HCC19".to_string(), 2), ("HCC85".to_string(), 1)]);
    }

    proptest::proptest! {
        #[test]
        fn prop_dot_form_equivalence(code in "[A-Z][0-9]{2}\\.?[0-9]{0,2}") {
            let l = HccLookup::from_entries([HccEntry::new(code.clone(), "d", Some("HCC1".to_string()))]);
            let stripped = code.replace('.', "");
            prop_assert_eq!(l.is_hcc_relevant(&code), l.is_hcc_relevant(&stripped));
        }
    }
}

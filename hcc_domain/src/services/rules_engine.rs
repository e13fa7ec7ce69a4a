//! # Rules Engine
//!
//! A registry of `(rule_id, description, predicate)` triples, per §4.7.
//! `evaluate` runs every predicate against a condition, catches predicate
//! panics (treated as `passed=false`, mirroring the source's "an exception
//! counts as a failed rule"), and returns exactly one result per registered
//! rule — §8 property 6, rule-engine totality.
//!
//! New rules register by `(id, description, predicate)` and the engine is
//! otherwise agnostic to what a predicate checks, so the Validator's
//! built-in four rules are just the first four entries in a
//! `RulesEngine::with_default_rules()`, not special-cased machinery.

use std::panic::{self, AssertUnwindSafe};

use crate::entities::{Condition, ValidationRuleResult};
use crate::services::hcc_lookup::HccLookup;

/// A single named predicate. The closure receives the condition being
/// validated and the HCC reference snapshot it may need to consult.
pub struct ValidationRule {
    pub id: &'static str,
    pub description: &'static str,
    predicate: Box<dyn Fn(&Condition, &HccLookup) -> bool + Send + Sync>,
}

impl ValidationRule {
    pub fn new(
        id: &'static str,
        description: &'static str,
        predicate: impl Fn(&Condition, &HccLookup) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            description,
            predicate: Box::new(predicate),
        }
    }
}

/// Ordered collection of validation rules. Evaluation order is
/// registration order, and every rule contributes exactly one
/// [`ValidationRuleResult`] to `evaluate`'s output, even when it panics.
pub struct RulesEngine {
    rules: Vec<ValidationRule>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn register(&mut self, rule: ValidationRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Runs every registered predicate against `condition`, in registration
    /// order. A predicate that panics is treated as `passed=false` rather
    /// than unwinding into the caller — a misbehaving rule must never take
    /// down a stage worker.
    pub fn evaluate(&self, condition: &Condition, reference: &HccLookup) -> Vec<ValidationRuleResult> {
        self.rules
            .iter()
            .map(|rule| {
                let passed = panic::catch_unwind(AssertUnwindSafe(|| (rule.predicate)(condition, reference))).unwrap_or(false);
                ValidationRuleResult {
                    rule_id: rule.id.to_string(),
                    description: rule.description.to_string(),
                    passed,
                }
            })
            .collect()
    }

    /// The four built-in rules the Validator runs, per §4.7:
    /// - `valid_icd_code`
    /// - `hcc_relevance_verified`
    /// - `sufficient_confidence`
    /// - `code_description_match`
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine
            .register(ValidationRule::new(
                "valid_icd_code",
                "Condition has an ICD-10 code present in the HCC reference set",
                |condition, reference| match condition.icd_code.as_deref().or(condition.icd_code_no_dot.as_deref()) {
                    Some(code) => reference.is_hcc_relevant(code),
                    None => false,
                },
            ))
            .register(ValidationRule::new(
                "hcc_relevance_verified",
                "If marked HCC-relevant, the HCC code is set and independently confirmed relevant",
                |condition, reference| {
                    if condition.hcc_relevant != Some(true) {
                        return true;
                    }
                    let has_hcc_code = condition.hcc_code.is_some();
                    let code = condition.icd_code.as_deref().or(condition.icd_code_no_dot.as_deref());
                    let confirmed = code.map(|c| reference.is_hcc_relevant(c)).unwrap_or(false);
                    has_hcc_code && confirmed
                },
            ))
            .register(ValidationRule::new(
                "sufficient_confidence",
                "Confidence is at least 0.7",
                |condition, _reference| condition.confidence >= 0.7,
            ))
            .register(ValidationRule::new(
                "code_description_match",
                "When both are present, the reference description matches the condition's description",
                |condition, reference| match (&condition.icd_code, &condition.icd_description) {
                    (Some(code), Some(description)) => match reference.get(code) {
                        Some(entry) => entry.description.eq_ignore_ascii_case(description.trim()),
                        None => true, // nothing to compare against; not this rule's failure mode
                    },
                    _ => true,
                },
            ));
        engine
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::HccEntry;

    fn reference() -> HccLookup {
        HccLookup::from_entries([HccEntry::new(
            "E11.9",
            "Type 2 diabetes mellitus without complications",
            Some("HCC19".to_string()),
        )])
    }

    #[test]
    fn fully_compliant_condition_passes_every_rule() {
        let engine = RulesEngine::with_default_rules();
        let mut condition = Condition::new("1", "Type 2 diabetes mellitus");
        condition.icd_code = Some("E11.9".to_string());
        condition.icd_code_no_dot = Some("E119".to_string());
        condition.icd_description = Some("Type 2 diabetes mellitus without complications".to_string());
        condition.confidence = 1.0;
        condition.hcc_relevant = Some(true);
        condition.hcc_code = Some("E119".to_string());

        let results = engine.evaluate(&condition, &reference());
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn totality_holds_even_for_empty_conditions() {
        let engine = RulesEngine::with_default_rules();
        let condition = Condition::new("1", "Unnamed");
        let results = engine.evaluate(&condition, &HccLookup::default());
        assert_eq!(results.len(), engine.rule_count());
    }

    #[test]
    fn panicking_rule_counts_as_failed_not_a_crash() {
        let mut engine = RulesEngine::new();
        engine.register(ValidationRule::new("boom", "always panics", |_c, _r| panic!("boom")));
        let condition = Condition::new("1", "x");
        let results = engine.evaluate(&condition, &HccLookup::default());
        assert_eq!(results.len(), 1);
        assert!(!results[0].passed);
    }

    #[test]
    fn low_confidence_fails_sufficient_confidence_rule() {
        let engine = RulesEngine::with_default_rules();
        let mut condition = Condition::new("1", "x");
        condition.confidence = 0.5;
        let results = engine.evaluate(&condition, &reference());
        let rule = results.iter().find(|r| r.rule_id == "sufficient_confidence").unwrap();
        assert!(!rule.passed);
    }
}

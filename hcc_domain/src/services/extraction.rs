//! # Rule-Based Extraction
//!
//! The deterministic half of the Extractor stage (§4.4.1 steps 1-3): regex
//! parsing of clinical metadata, locating the Assessment/Plan section, and
//! splitting it into numbered conditions. None of this touches the LLM or
//! any collaborator port, so it lives in the domain layer as pure text
//! algorithms — the application layer only adds the LLM-assisted merge on
//! top.

use std::sync::OnceLock;

use regex::Regex;

use crate::entities::Condition;

/// Regex-extracted clinical metadata. Every field is optional, per §4.4.1
/// step 1 ("All fields optional").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalMetadata {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub provider: Option<String>,
    pub appointment_date: Option<String>,
    pub chief_complaint: Option<String>,
}

fn field_regex(label_alternation: &str) -> Regex {
    Regex::new(&format!(r"(?im)^\s*(?:{label_alternation})\s*:\s*(.+?)\s*$")).expect("static metadata regex is valid")
}

fn capture_first(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string())
}

/// Parses patient name, patient id, age, gender, DOB, provider, appointment
/// date, and chief complaint from `label: value` lines anywhere in the
/// document. Matching is case-insensitive and tolerant of label synonyms
/// clinical notes commonly use.
pub fn parse_clinical_metadata(text: &str) -> ClinicalMetadata {
    ClinicalMetadata {
        patient_name: capture_first(&field_regex("patient name|patient"), text),
        patient_id: capture_first(&field_regex("patient id|mrn|patient number"), text),
        age: capture_first(&field_regex("age"), text),
        gender: capture_first(&field_regex("gender|sex"), text),
        dob: capture_first(&field_regex("dob|date of birth"), text),
        provider: capture_first(&field_regex("provider|physician|attending"), text),
        appointment_date: capture_first(&field_regex("appointment date|visit date|date of service|encounter date"), text),
        chief_complaint: capture_first(&field_regex("chief complaint|cc"), text),
    }
}

fn section_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*assessment\s*/?\s*(?:and\s*)?plan\s*:?\s*$").expect("static section header regex is valid")
    })
}

fn section_terminator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:return to office|encounter sign-off|follow-up|plan of care)\b").expect("static terminator regex is valid")
    })
}

/// Locates the Assessment/Plan section (§4.4.1 step 2): the text between a
/// header matching `Assessment / Plan`, `Assessment Plan`, or `Assessment
/// and Plan` (case-insensitive, flexible whitespace/slash) and whichever
/// comes first of a known terminator heading or end-of-document. Returns
/// `None` if no such header is found — callers fall back to an empty
/// rule-based condition list, per the edge case in §4.4.1.
pub fn extract_assessment_plan_section(text: &str) -> Option<String> {
    let header = section_header_regex();
    let header_match = header.find(text)?;
    let body_start = header_match.end();
    let remainder = &text[body_start..];

    let body_end = section_terminator_regex().find(remainder).map(|m| m.start()).unwrap_or(remainder.len());

    Some(remainder[..body_end].trim().to_string())
}

fn numbered_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(\d+)\.\s*(.+?)\s*-\s*(.+)$").expect("static numbered item regex is valid"))
}

fn icd_detail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([A-Z]\d{1,2}\.\d{1,3})\s*:\s*(.+?)(?:;|$)").expect("static icd detail regex is valid"))
}

/// Splits an Assessment/Plan section into numbered conditions (§4.4.1 step
/// 3): each `<n>. <name> - <details>` line becomes one condition, and
/// within `details` an `<LETTER><digits>.<digits>: <icd_description>`
/// pattern yields `icd_code`/`icd_description`. Confidence for every
/// rule-based condition is `1.0` and `metadata.extraction_method` is set to
/// `"rule_based"`.
pub fn extract_rule_based_conditions(section: &str) -> Vec<Condition> {
    numbered_item_regex()
        .captures_iter(section)
        .map(|caps| {
            let index = &caps[1];
            let name = caps[2].trim().to_string();
            let details = caps[3].trim().to_string();

            let mut condition = Condition::new(format!("rule-{index}"), name);
            condition.details = Some(details.clone());
            condition.confidence = 1.0;
            condition
                .metadata
                .insert("extraction_method".to_string(), serde_json::Value::String("rule_based".to_string()));

            if let Some(icd_caps) = icd_detail_regex().captures(&details) {
                condition.icd_code = Some(icd_caps[1].to_uppercase());
                condition.icd_description = Some(icd_caps[2].trim().to_string());
                condition.normalize_icd();
            }

            condition
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "\
Patient Name: Jane Doe
Patient ID: 12345
Age: 64
Gender: F
Chief Complaint: Follow-up for diabetes

Assessment / Plan

1. Type 2 diabetes mellitus - Stable; E11.9: Type 2 diabetes mellitus without complications
2. Essential hypertension - Well controlled; I10: Essential (primary) hypertension

Return to Office in 3 months.
";

    #[test]
    fn parses_clinical_metadata_fields() {
        let meta = parse_clinical_metadata(NOTE);
        assert_eq!(meta.patient_name.as_deref(), Some("Jane Doe"));
        assert_eq!(meta.patient_id.as_deref(), Some("12345"));
        assert_eq!(meta.age.as_deref(), Some("64"));
        assert_eq!(meta.chief_complaint.as_deref(), Some("Follow-up for diabetes"));
    }

    #[test]
    fn extracts_assessment_plan_section_bounded_by_terminator() {
        let section = extract_assessment_plan_section(NOTE).expect("section present");
        assert!(section.contains("Type 2 diabetes"));
        assert!(section.contains("Essential hypertension"));
        assert!(!section.contains("Return to Office"));
    }

    #[test]
    fn missing_section_returns_none() {
        assert!(extract_assessment_plan_section("No headers here at all.").is_none());
    }

    #[test]
    fn extracts_numbered_conditions_with_icd_codes() {
        let section = extract_assessment_plan_section(NOTE).unwrap();
        let conditions = extract_rule_based_conditions(&section);
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].icd_code.as_deref(), Some("E11.9"));
        assert_eq!(conditions[0].icd_code_no_dot.as_deref(), Some("E119"));
        assert_eq!(conditions[0].confidence, 1.0);
        assert_eq!(
            conditions[0].metadata.get("extraction_method").and_then(|v| v.as_str()),
            Some("rule_based")
        );
    }

    #[test]
    fn empty_section_yields_no_conditions() {
        assert!(extract_rule_based_conditions("").is_empty());
    }
}

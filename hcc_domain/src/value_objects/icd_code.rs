//! # ICD-10 Code Normalization
//!
//! A condition may carry an ICD-10 code in dotted form (`E11.9`), undotted
//! form (`E119`), or both. The only normalization the spec defines is dot
//! removal, so this module keeps that single transformation in one place
//! rather than scattering `.replace(".", "")` calls through the stage
//! workers and the HCC reference lookup.

/// Removes the single dot from a dotted ICD-10 code, if present. Codes
/// without a dot pass through unchanged, and whitespace is trimmed first
/// since reference data and LLM output are not always clean.
pub fn strip_dot(code: &str) -> String {
    code.trim().replace('.', "")
}

/// Given whichever of `icd_code` / `icd_code_no_dot` is known, fills in the
/// other. Per the data model, exactly one of the two may be absent; when
/// both are `None` this is a no-op.
pub fn normalize_pair(icd_code: &mut Option<String>, icd_code_no_dot: &mut Option<String>) {
    match (icd_code.as_ref(), icd_code_no_dot.as_ref()) {
        (Some(dotted), None) => {
            *icd_code_no_dot = Some(strip_dot(dotted));
        }
        (None, Some(undotted)) => {
            // There is no reliable way to re-insert the dot at the correct
            // position from the undotted form alone for every ICD-10
            // pattern, so the dotted form is left absent. Downstream
            // lookups key on the undotted form anyway.
            let _ = undotted;
        }
        _ => {}
    }
}

//! # LLM Prompting & Tolerant Parsing
//!
//! Shared between the Extractor and Analyzer (the only two stages that
//! call the LLM, §4.6): prompt templates and the layered tolerant JSON
//! parser. Modeled as an explicit `Parsed(list) | Empty` result rather
//! than exception-based control flow, per the redesign note — each layer
//! is tried in order and the first success wins; total failure is a
//! value, not a caught panic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NAN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[Nn]a[Nn]\b").expect("static NaN token regex is valid"));

/// The outcome of tolerantly parsing an LLM completion for a `conditions`
/// array. `Empty` covers every failure mode (the `conditions` key is
/// missing, the JSON doesn't parse at all, or the text contains nothing
/// recognizable) — callers never distinguish why, they just fall back to
/// rule-based output, per §4.6's failure semantics.
pub enum ParsedLlm {
    Parsed(Vec<Value>),
    Empty,
}

impl ParsedLlm {
    pub fn into_conditions(self) -> Vec<Value> {
        match self {
            ParsedLlm::Parsed(v) => v,
            ParsedLlm::Empty => Vec::new(),
        }
    }
}

/// Rewrites bare `NaN`/`nan` tokens to `null` before parsing, since LLM
/// output sometimes emits Python-style float literals that aren't valid
/// JSON (§4.6 pre-parse sanitization).
fn sanitize_nan_tokens(text: &str) -> String {
    NAN_TOKEN.replace_all(text, "null").into_owned()
}

fn extract_conditions_array(value: &Value) -> Option<Vec<Value>> {
    value.get("conditions").and_then(|v| v.as_array()).cloned()
}

/// Layer (a): the completion is already a bare JSON object.
fn try_direct_parse(text: &str) -> Option<Vec<Value>> {
    serde_json::from_str::<Value>(text).ok().as_ref().and_then(extract_conditions_array)
}

/// Layer (b): the completion wraps JSON in a fenced code block, e.g.
/// ` ```json\n{...}\n``` `.
fn try_fenced_block(text: &str) -> Option<Vec<Value>> {
    let fence = "```";
    let start = text.find(fence)? + fence.len();
    let rest = &text[start..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find(fence)?;
    let inner = rest[..end].trim();
    serde_json::from_str::<Value>(inner).ok().as_ref().and_then(extract_conditions_array)
}

/// Layer (c): a greedy `{"conditions": ...}` substring match — find the
/// first `{` that opens a region containing `"conditions"` and the last
/// matching `}`, and try to parse just that span. This tolerates
/// conversational preamble/postamble around the JSON the model was asked
/// to emit.
fn try_greedy_substring(text: &str) -> Option<Vec<Value>> {
    let key_pos = text.find("\"conditions\"")?;
    let open = text[..key_pos].rfind('{')?;
    let close = text.rfind('}')?;
    if close <= open {
        return None;
    }
    let candidate = &text[open..=close];
    serde_json::from_str::<Value>(candidate).ok().as_ref().and_then(extract_conditions_array)
}

/// Parses an LLM completion for its `conditions` array, trying layers (a),
/// (b), (c) in order and returning the first success. `ParsedLlm::Empty`
/// on total failure — never an error, since a malformed LLM response must
/// degrade the stage to rule-based output, not fail it.
pub fn tolerant_parse_conditions(raw_completion: &str) -> ParsedLlm {
    let sanitized = sanitize_nan_tokens(raw_completion);

    try_direct_parse(&sanitized)
        .or_else(|| try_fenced_block(&sanitized))
        .or_else(|| try_greedy_substring(&sanitized))
        .map(ParsedLlm::Parsed)
        .unwrap_or_else(|| {
            tracing::warn!("could not extract a conditions array from LLM output after all tolerant parse layers");
            ParsedLlm::Empty
        })
}

/// Prompt for the Extractor's LLM-assisted pass (§4.4.1 step 4): submit
/// the full document and ask for a `conditions` array shaped like
/// `Condition`'s wire fields.
pub fn extraction_prompt(document_text: &str) -> String {
    format!(
        "You are a clinical coding assistant. Read the following progress note and list every \
         medical condition discussed in its Assessment/Plan, each with its ICD-10 code if stated \
         or clearly implied.\n\n\
         Respond with ONLY a JSON object of the shape:\n\
         {{\"conditions\": [{{\"id\": \"string\", \"name\": \"string\", \"icd_code\": \"string or null\", \
         \"icd_code_no_dot\": \"string or null\", \"icd_description\": \"string or null\", \
         \"details\": \"string or null\", \"status\": \"string or null\", \"confidence\": 0.0}}]}}\n\n\
         Progress note:\n{document_text}"
    )
}

/// Prompt for the Analyzer's LLM-enrichment pass (§4.4.2 step 4): submit
/// every condition plus a size-capped sample of HCC reference entries and
/// ask for HCC-relevance opinions keyed by condition id.
pub fn analysis_prompt(conditions_json: &Value, hcc_sample_json: &Value) -> String {
    format!(
        "You are a medical risk-adjustment coding assistant. For each condition below, decide \
         whether it is HCC (Hierarchical Condition Category) relevant, referencing the sample of \
         known HCC-relevant codes if it helps.\n\n\
         Respond with ONLY a JSON object of the shape:\n\
         {{\"conditions\": [{{\"id\": \"string\", \"hcc_relevant\": true, \"hcc_code\": \"string or null\", \
         \"hcc_category\": \"string or null\", \"confidence\": 0.0, \"reasoning\": \"string\"}}]}}\n\n\
         Conditions:\n{conditions_json}\n\n\
         Sample of known HCC-relevant codes:\n{hcc_sample_json}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_json_parses() {
        let raw = r#"{"conditions": [{"id": "1", "name": "x"}]}"#;
        let parsed = tolerant_parse_conditions(raw).into_conditions();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn fenced_block_parses() {
        let raw = "Here you go:\n```json\n{\"conditions\": [{\"id\": \"1\"}]}\n```\nLet me know if you need more.";
        let parsed = tolerant_parse_conditions(raw).into_conditions();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn greedy_substring_parses_with_preamble_and_postamble() {
        let raw = "Sure! {\"conditions\": [{\"id\": \"1\"}, {\"id\": \"2\"}]} Hope that helps!";
        let parsed = tolerant_parse_conditions(raw).into_conditions();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn total_garbage_yields_empty() {
        let parsed = tolerant_parse_conditions("not json at all, sorry");
        assert!(matches!(parsed, ParsedLlm::Empty));
    }

    #[test]
    fn nan_tokens_are_sanitized_before_parsing() {
        let raw = r#"{"conditions": [{"id": "1", "confidence": NaN}]}"#;
        let parsed = tolerant_parse_conditions(raw).into_conditions();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0]["confidence"].is_null());
    }
}

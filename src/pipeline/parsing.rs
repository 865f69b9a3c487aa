//! Pure extraction of structured data from free-text reasoning output.
//!
//! Hosted completion models wrap JSON in Markdown code fences, truncate it,
//! or drop keys. Everything here is total: malformed input produces a
//! well-formed fallback, never an error, and none of it touches a capability,
//! so the brittle part of the pipeline is testable in isolation.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{DecisionData, DecisionStatus};

/// Justification used when decision output was not parseable JSON.
pub const UNPARSEABLE_OUTPUT_JUSTIFICATION: &str =
    "Reasoning output could not be parsed; routed for manual review.";

/// Justification used when the output parsed but carried no usable decision.
pub const MISSING_DECISION_JUSTIFICATION: &str = "Insufficient data to decide.";

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*(.*?)\s*```\s*$").expect("valid fence pattern")
    })
}

/// Removes a surrounding Markdown code fence (```json ... ```), if present.
pub fn strip_code_fences(raw: &str) -> &str {
    match fence_pattern().captures(raw) {
        Some(captures) => captures.get(1).map_or("", |m| m.as_str()),
        None => raw.trim(),
    }
}

/// Parses the attribute-extraction response into a key→value mapping.
///
/// Soft-fail by contract: anything that is not a JSON object becomes the
/// empty mapping.
pub fn parse_attributes(raw: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(strip_code_fences(raw)) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// Parses the decision response into a [`DecisionData`].
///
/// The fallback ladder mirrors how the output usually breaks:
///
/// * not JSON at all → needs review, [`UNPARSEABLE_OUTPUT_JUSTIFICATION`],
///   referenced clauses = `fallback_clauses`;
/// * JSON but no usable `decision` key → needs review,
///   [`MISSING_DECISION_JUSTIFICATION`], referenced clauses = `fallback_clauses`;
/// * otherwise the parsed object, with `referenced_clauses` defaulting to
///   `fallback_clauses` when absent or malformed.
pub fn parse_decision(raw: &str, fallback_clauses: &[String]) -> DecisionData {
    let value = match serde_json::from_str::<serde_json::Value>(strip_code_fences(raw)) {
        Ok(value) => value,
        Err(_) => {
            return DecisionData::needs_review(
                UNPARSEABLE_OUTPUT_JUSTIFICATION,
                fallback_clauses.to_vec(),
            );
        }
    };

    let status = value
        .get("decision")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<DecisionStatus>().ok());
    let Some(status) = status else {
        return DecisionData::needs_review(
            MISSING_DECISION_JUSTIFICATION,
            fallback_clauses.to_vec(),
        );
    };

    let amount = value.get("amount").and_then(|v| v.as_f64());
    let justification = value
        .get("justification")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let referenced_clauses = value
        .get("referenced_clauses")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| fallback_clauses.to_vec());

    DecisionData {
        status,
        amount,
        justification,
        referenced_clauses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> Vec<String> {
        vec!["clause one".to_string(), "clause two".to_string()]
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn attributes_fall_back_to_empty_mapping() {
        assert!(parse_attributes("not json at all").is_empty());
        assert!(parse_attributes("[1, 2, 3]").is_empty());

        let attrs = parse_attributes("```json\n{\"age\": 46, \"procedure\": \"knee surgery\"}\n```");
        assert_eq!(attrs["age"], 46);
        assert_eq!(attrs["procedure"], "knee surgery");
    }

    #[test]
    fn well_formed_decision_parses_through() {
        let raw = r#"```json
        {"decision": "Approved", "amount": 1500.50, "justification": "within coverage",
         "referenced_clauses": ["clause a"]}
        ```"#;
        let decision = parse_decision(raw, &refs());
        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.amount, Some(1500.50));
        assert_eq!(decision.justification, "within coverage");
        assert_eq!(decision.referenced_clauses, vec!["clause a".to_string()]);
    }

    #[test]
    fn unparseable_output_degrades_with_fallback_clauses() {
        let decision = parse_decision("I think you should be approved!", &refs());
        assert_eq!(decision.status, DecisionStatus::NeedsReview);
        assert_eq!(decision.amount, None);
        assert_eq!(decision.justification, UNPARSEABLE_OUTPUT_JUSTIFICATION);
        assert_eq!(decision.referenced_clauses, refs());
    }

    #[test]
    fn missing_decision_key_degrades_with_fallback_clauses() {
        let decision = parse_decision(r#"{"justification": "maybe"}"#, &refs());
        assert_eq!(decision.status, DecisionStatus::NeedsReview);
        assert_eq!(decision.justification, MISSING_DECISION_JUSTIFICATION);
        assert_eq!(decision.referenced_clauses, refs());
    }

    #[test]
    fn unknown_status_spelling_degrades() {
        let decision = parse_decision(r#"{"decision": "Maybe"}"#, &refs());
        assert_eq!(decision.status, DecisionStatus::NeedsReview);
    }

    #[test]
    fn spaced_and_compact_needs_review_both_parse() {
        for spelling in ["Needs Review", "NeedsReview"] {
            let raw = format!(r#"{{"decision": "{spelling}", "justification": "x"}}"#);
            let decision = parse_decision(&raw, &[]);
            assert_eq!(decision.status, DecisionStatus::NeedsReview);
            assert_eq!(decision.justification, "x");
        }
    }

    #[test]
    fn null_amount_and_missing_clause_list_use_defaults() {
        let raw = r#"{"decision": "Rejected", "amount": null, "justification": "excluded"}"#;
        let decision = parse_decision(raw, &refs());
        assert_eq!(decision.status, DecisionStatus::Rejected);
        assert_eq!(decision.amount, None);
        assert_eq!(decision.referenced_clauses, refs());
    }
}

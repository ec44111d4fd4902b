//! # Output repair
//!
//! Staged recovery of a structured record from unreliable model output.
//! Models asked to emit a JSON record routinely wrap it in prose or
//! markdown, truncate the encoding, or echo multi-line content with raw
//! control characters inside quoted values. [`repair`] runs a fixed
//! sequence of strategies against the raw text — each only on failure of
//! the previous, with no re-invocation of the model:
//!
//! 1. Strip markdown fences and parse the remainder directly.
//! 2. Scan for the first balanced outer `{...}` pair by nesting depth
//!    (string- and escape-aware) and parse only that substring.
//! 3. Rewrite literal newline/tab/control characters found inside quoted
//!    values into escaped form, then retry the structural parse.
//! 4. As a last resort, extract a small known set of expected field names
//!    directly from the raw text, producing a partial record reported as
//!    unsuccessful.
//!
//! Repair never returns an error and never performs I/O: identical input
//! always yields identical output. All scanning is manual string
//! operations — no regex.

mod escape;
mod extract;
mod fields;

pub use escape::escape_control_chars;
pub use extract::{find_balanced, strip_fences};
pub use fields::extract_fields;

use serde_json::{Map, Value};

/// Which strategy produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    /// Fence stripping plus a direct parse was enough.
    Direct,
    /// The record was found as a balanced `{...}` substring.
    Balanced,
    /// Control characters inside quoted values had to be escaped first.
    EscapedControls,
    /// Only fixed-pattern field extraction matched; the record is partial.
    FieldExtraction,
    /// Nothing matched; the record is empty.
    Unrecovered,
}

/// Result of one repair attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// The recovered field mapping. Partial (or empty) when
    /// `succeeded` is `false`.
    pub record: Map<String, Value>,
    /// Whether a structural parse succeeded (strategies 1–3). Fixed-pattern
    /// extraction reports `false` so callers can treat the record as a
    /// best-effort salvage.
    pub succeeded: bool,
    /// Which strategy produced the record.
    pub strategy: RepairStrategy,
}

/// Recover a structured record from raw model output.
///
/// Equivalent to [`repair_with_fields`] with no expected field names, so
/// the last-resort extraction stage is skipped.
///
/// # Example
///
/// ```
/// use agent_graph::repair::repair;
///
/// let out = repair("Here you go:\n```json\n{\"approved\": true}\n```");
/// assert!(out.succeeded);
/// assert_eq!(out.record["approved"], true);
/// ```
pub fn repair(raw: &str) -> RepairOutcome {
    repair_with_fields(raw, &[])
}

/// Recover a structured record, falling back to extraction of the given
/// expected field names when no structural parse succeeds.
///
/// # Example
///
/// ```
/// use agent_graph::repair::repair_with_fields;
///
/// // No delimiters at all — only field extraction can salvage this.
/// let out = repair_with_fields("intent: deploy\nconfidence: 0.9", &["intent", "confidence"]);
/// assert!(!out.succeeded);
/// assert_eq!(out.record["intent"], "deploy");
/// ```
pub fn repair_with_fields(raw: &str, expected_fields: &[&str]) -> RepairOutcome {
    let cleaned = strip_fences(raw);

    // Strategy 1: direct parse of the unwrapped text.
    if let Some(record) = parse_record(&cleaned) {
        return RepairOutcome {
            record,
            succeeded: true,
            strategy: RepairStrategy::Direct,
        };
    }

    // Strategy 2: first balanced outer object. Tracking nesting depth
    // matters here — cutting at the first closing brace is frequently
    // wrong when the payload itself contains nested structures.
    if let Some(candidate) = find_balanced(&cleaned, '{', '}') {
        if let Some(record) = parse_record(candidate) {
            return RepairOutcome {
                record,
                succeeded: true,
                strategy: RepairStrategy::Balanced,
            };
        }
    }

    // Strategy 3: escape raw control characters inside quoted values and
    // retry both parses.
    let escaped = escape_control_chars(&cleaned);
    if escaped != cleaned {
        if let Some(record) = parse_record(&escaped) {
            return RepairOutcome {
                record,
                succeeded: true,
                strategy: RepairStrategy::EscapedControls,
            };
        }
        if let Some(candidate) = find_balanced(&escaped, '{', '}') {
            if let Some(record) = parse_record(candidate) {
                return RepairOutcome {
                    record,
                    succeeded: true,
                    strategy: RepairStrategy::EscapedControls,
                };
            }
        }
    }

    // Strategy 4: fixed-pattern extraction against the raw text. Partial
    // by construction, so it reports failure either way.
    let record = extract_fields(raw, expected_fields);
    let strategy = if record.is_empty() {
        RepairStrategy::Unrecovered
    } else {
        RepairStrategy::FieldExtraction
    };
    RepairOutcome {
        record,
        succeeded: false,
        strategy,
    }
}

/// Parse text as a JSON object. Arrays and scalars do not count — the
/// contract is a mapping of named fields.
fn parse_record(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_json_parses_directly() {
        let out = repair(r#"{"intent": "codegen", "action_needed": true}"#);
        assert!(out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::Direct);
        assert_eq!(out.record["intent"], "codegen");
    }

    #[test]
    fn fenced_json_parses_directly() {
        let out = repair("```json\n{\"status\": \"planned\"}\n```");
        assert!(out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::Direct);
        assert_eq!(out.record["status"], "planned");
    }

    #[test]
    fn json_inside_prose_found_by_balanced_scan() {
        let out = repair(r#"Sure! The analysis: {"category": "build", "nested": {"depth": 2}} Hope that helps."#);
        assert!(out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::Balanced);
        assert_eq!(out.record["nested"], json!({"depth": 2}));
    }

    // Fenced record with a raw newline inside a quoted value: fence
    // stripping and the balanced scan both produce unparseable text, the
    // escaping pass recovers it.
    #[test]
    fn raw_newline_in_quoted_value_recovered_by_escaping() {
        let raw = "```json\n{\"description\": \"line one\nline two\", \"severity\": \"low\"}\n```";
        let out = repair(raw);
        assert!(out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::EscapedControls);
        assert_eq!(out.record["description"], "line one\nline two");
        assert_eq!(out.record["severity"], "low");
    }

    // No structural delimiters at all — only the known-field extraction
    // can salvage something, and it reports failure.
    #[test]
    fn free_text_salvaged_by_field_extraction() {
        let raw = "Summary of my analysis.\nintent: deploy\nenvironment: staging";
        let out = repair_with_fields(raw, &["intent", "environment", "absent"]);
        assert!(!out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::FieldExtraction);
        assert_eq!(out.record["intent"], "deploy");
        assert_eq!(out.record["environment"], "staging");
        assert!(!out.record.contains_key("absent"));
    }

    #[test]
    fn hopeless_input_yields_empty_record() {
        let out = repair_with_fields("nothing structured here", &["intent"]);
        assert!(!out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::Unrecovered);
        assert!(out.record.is_empty());
    }

    #[test]
    fn arrays_are_not_records() {
        // A top-level array is not a mapping of named fields.
        let out = repair("[1, 2, 3]");
        assert!(!out.succeeded);
        assert_eq!(out.strategy, RepairStrategy::Unrecovered);
    }

    #[test]
    fn repair_is_deterministic() {
        let raw = "```\n{\"a\": \"x\ty\", \"b\":";
        let first = repair_with_fields(raw, &["a", "b"]);
        for _ in 0..10 {
            assert_eq!(repair_with_fields(raw, &["a", "b"]), first);
        }
    }

    #[test]
    fn empty_input_never_panics() {
        let out = repair("");
        assert!(!out.succeeded);
        assert!(out.record.is_empty());
    }
}

//! Last-resort extraction of known fields from unstructured text.

use serde_json::{Map, Value};

/// Extract a partial record by matching a known set of field names
/// directly against raw text.
///
/// Matches both `"field": value` and bare `field: value` forms at word
/// boundaries. Quoted values are read escape-aware up to the closing
/// quote; unquoted values run to the next line break, comma, or closing
/// brace, with literal `true`/`false`/`null` and numbers converted to
/// their JSON types. Fields that never match are omitted.
///
/// # Examples
///
/// ```
/// use agent_graph::repair::extract_fields;
///
/// let record = extract_fields("intent: deploy\ncount: 3", &["intent", "count"]);
/// assert_eq!(record["intent"], "deploy");
/// assert_eq!(record["count"], 3);
/// ```
pub fn extract_fields(text: &str, fields: &[&str]) -> Map<String, Value> {
    let mut record = Map::new();
    for &field in fields {
        if field.is_empty() {
            continue;
        }
        if let Some(value) = extract_field(text, field) {
            record.insert(field.to_string(), value);
        }
    }
    record
}

/// Find the first `field ... : value` occurrence at a word boundary.
fn extract_field(text: &str, field: &str) -> Option<Value> {
    let mut search = 0;
    while let Some(offset) = text[search..].find(field) {
        let start = search + offset;
        let end = start + field.len();

        let boundary_before = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');

        let mut rest = &text[end..];
        // Skip a closing quote around the field name.
        if let Some(stripped) = rest.strip_prefix('"').or_else(|| rest.strip_prefix('\'')) {
            rest = stripped;
        }
        let rest = rest.trim_start_matches([' ', '\t']);

        if boundary_before {
            if let Some(after_colon) = rest.strip_prefix(':') {
                let value_text = after_colon.trim_start_matches([' ', '\t']);
                if let Some(value) = parse_value(value_text) {
                    return Some(value);
                }
            }
        }

        search = end;
    }
    None
}

/// Parse the text following a matched `field:` into a JSON value.
fn parse_value(text: &str) -> Option<Value> {
    if let Some(quoted) = text.strip_prefix('"') {
        return Some(Value::String(read_quoted(quoted)));
    }

    // An unquoted value ends at the line break or the next structural
    // delimiter, whichever comes first.
    let end = text.find(['\n', ',', '}']).unwrap_or(text.len());
    let line = text[..end].trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(n) = line.parse::<i64>() {
        return Some(Value::from(n));
    }
    if let Ok(f) = line.parse::<f64>() {
        return Some(Value::from(f));
    }
    match line {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        other => Some(Value::String(other.trim_matches('\'').to_string())),
    }
}

/// Read a double-quoted value escape-aware. An unterminated quote (or a
/// raw newline) ends the value at that point.
fn read_quoted(text: &str) -> String {
    let mut out = String::new();
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            out.push(match ch {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            continue;
        }
        match ch {
            '\\' => escape_next = true,
            '"' | '\n' => break,
            other => out.push(other),
        }
    }

    out
}

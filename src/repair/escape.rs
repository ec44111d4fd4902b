//! Control-character escaping inside quoted values.

/// Rewrite literal control characters found inside quoted string values
/// into their escaped forms.
///
/// A frequent model artifact when echoing multi-line content: the record
/// is structurally fine but carries a raw newline or tab inside a string,
/// which a strict parser rejects. Characters outside quoted values are
/// left untouched; already-escaped sequences are preserved.
///
/// # Examples
///
/// ```
/// use agent_graph::repair::escape_control_chars;
///
/// let fixed = escape_control_chars("{\"msg\": \"line one\nline two\"}");
/// assert_eq!(fixed, "{\"msg\": \"line one\\nline two\"}");
/// ```
pub fn escape_control_chars(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            result.push(ch);
            continue;
        }

        if in_string {
            match ch {
                '\\' => {
                    escape_next = true;
                    result.push(ch);
                }
                '"' => {
                    in_string = false;
                    result.push(ch);
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    result.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => result.push(c),
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        }
        result.push(ch);
    }

    result
}

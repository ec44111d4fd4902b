//! Wrapping-marker removal and balanced-delimiter scanning.

/// Remove markdown fence wrapping from model output.
///
/// If the text contains a complete fenced block (with or without a
/// language tag), returns that block's content. An unclosed leading fence
/// is dropped along with its tag line. Text without fences is returned
/// trimmed.
///
/// # Examples
///
/// ```
/// use agent_graph::repair::strip_fences;
///
/// assert_eq!(strip_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_fences("  {\"a\": 1}  "), "{\"a\": 1}");
/// ```
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(fence_start) = trimmed.find("```") {
        let after_backticks = fence_start + 3;
        // The fence's tag line ends at the next newline; a fence with no
        // newline at all has no content.
        let content_start = match trimmed[after_backticks..].find('\n') {
            Some(offset) => after_backticks + offset + 1,
            None => return String::new(),
        };
        return match trimmed[content_start..].find("```") {
            Some(close) => trimmed[content_start..content_start + close].trim().to_string(),
            // Unclosed fence: keep everything after the tag line.
            None => trimmed[content_start..].trim().to_string(),
        };
    }

    trimmed.to_string()
}

/// Find the first balanced delimiter pair, tracking nesting depth.
///
/// Quote and escape state are tracked so delimiters inside string values
/// do not affect the depth count. Returns the full substring including the
/// outer delimiters, or `None` when no balanced pair exists.
///
/// - `find_balanced(text, '{', '}')` — finds a JSON object
/// - `find_balanced(text, '[', ']')` — finds a JSON array
///
/// # Examples
///
/// ```
/// use agent_graph::repair::find_balanced;
///
/// let input = r#"Result: {"a": {"b": 1}} trailing"#;
/// assert_eq!(find_balanced(input, '{', '}'), Some(r#"{"a": {"b": 1}}"#));
/// ```
pub fn find_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=start + i]);
            }
        }
    }

    None
}

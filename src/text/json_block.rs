//! Fenced JSON extraction for judge responses.
//!
//! Judges are asked to answer with a ```json fenced object. Reasoning models
//! may emit a `<think>` preamble first; [`strip_reasoning`] drops everything
//! up to the last closing think marker before the fence is searched.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::sections::THINK;

fn json_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

/// Return the text after the last `</think>` marker, or the whole text.
pub fn strip_reasoning(text: &str) -> &str {
    match text.rfind(THINK.end) {
        Some(pos) => text[pos + THINK.end.len()..].trim(),
        None => text.trim(),
    }
}

/// Find the index of the brace closing the object that opens at `s[0]`.
///
/// Braces inside string literals (including escaped quotes) are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the first ```json fenced object in `content`.
///
/// Returns `None` if no fence is present or its body is not a JSON object.
pub fn extract_json_block(content: &str) -> Option<Value> {
    let caps = json_fence()?.captures(content)?;
    let body = caps.get(1)?.as_str().trim();
    if !body.starts_with('{') {
        return None;
    }
    let candidate = match find_matching_brace(body) {
        Some(end) => &body[..=end],
        None => body,
    };
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fenced_object() {
        let content = "Here is my verdict:\n```json\n{\"Clarity\": {\"Score\": 8}}\n```\nDone.";
        let value = extract_json_block(content).expect("should parse");
        assert_eq!(value["Clarity"]["Score"], 8);
    }

    #[test]
    fn test_trailing_text_inside_fence_is_cut_at_matching_brace() {
        let content = "```json\n{\"a\": \"}\"} trailing words\n```";
        let value = extract_json_block(content).expect("should parse");
        assert_eq!(value["a"], "}");
    }

    #[test]
    fn test_missing_fence_or_bad_json() {
        assert!(extract_json_block("{\"a\": 1}").is_none());
        assert!(extract_json_block("```json\n[1, 2]\n```").is_none());
        assert!(extract_json_block("```json\n{\"a\": \n```").is_none());
    }

    #[test]
    fn test_strip_reasoning_keeps_text_after_last_think() {
        let content = "<think>first</think> middle <think>second</think>\n answer ";
        assert_eq!(strip_reasoning(content), "answer");
        assert_eq!(strip_reasoning("  no reasoning "), "no reasoning");
    }

    #[test]
    fn test_find_matching_brace_nested_and_strings() {
        assert_eq!(find_matching_brace("{\"a\": {\"b\": 1}}"), Some(14));
        assert_eq!(find_matching_brace("{\"a\": \"\\\"}\"}"), Some(11));
        assert_eq!(find_matching_brace("{unclosed"), None);
        assert_eq!(find_matching_brace("}"), None);
    }
}

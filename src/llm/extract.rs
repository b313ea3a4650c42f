//! Outermost-`{...}` JSON extraction, transcribed from the teacher's
//! `adapter::semantic::extract_json` three-stage fallback (direct parse,
//! fenced-code-block parse, first-`{`-to-last-`}` span parse), returning a
//! flat top-level key map rather than a raw `serde_json::Value` since every
//! call site here checks required top-level keys.

use serde_json::Value;
use std::collections::HashMap;

pub fn extract_json(text: &str) -> Option<HashMap<String, Value>> {
    let trimmed = text.trim();

    if let Some(obj) = try_parse_object(trimmed) {
        return Some(obj);
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };
    if let Some(block) = fenced {
        if let Some(obj) = try_parse_object(block.trim()) {
            return Some(obj);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(obj) = try_parse_object(&trimmed[start..=end]) {
                return Some(obj);
            }
        }
    }

    None
}

fn try_parse_object(text: &str) -> Option<HashMap<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map.into_iter().collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json() {
        let obj = extract_json("{\"a\": 1}").unwrap();
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn parses_fenced_json_block() {
        let text = "Here is the result:\n```json\n{\"a\": 1}\n```\nThanks.";
        let obj = extract_json(text).unwrap();
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn parses_first_to_last_brace_span() {
        let text = "Sure, here you go: { \"a\": 1 } — let me know if that helps.";
        let obj = extract_json(text).unwrap();
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn returns_none_for_non_object_json() {
        assert!(extract_json("[1, 2, 3]").is_none());
    }

    #[test]
    fn returns_none_for_unparseable_text() {
        assert!(extract_json("this is not json at all").is_none());
    }
}

use serde_json::Value;

/// Find a JSON value in free-form model output.
///
/// Accepts bare JSON, fenced blocks and objects embedded in prose.
pub fn parse_json_from_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if start < end {
                if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Some(v);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_bare_fenced_and_embedded_json() {
        assert_eq!(parse_json_from_text(" {\"a\": 1} "), Some(json!({ "a": 1 })));
        assert_eq!(
            parse_json_from_text("```json\n{\"a\": true}\n```"),
            Some(json!({ "a": true }))
        );
        assert_eq!(
            parse_json_from_text("Sure! {\"a\": \"b\"} Hope that helps."),
            Some(json!({ "a": "b" }))
        );
    }

    #[test]
    fn returns_none_for_prose() {
        assert_eq!(parse_json_from_text("not json at all"), None);
        assert_eq!(parse_json_from_text("} backwards {"), None);
    }
}

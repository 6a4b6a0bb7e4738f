use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty response content")]
    Empty,
    #[error("no JSON found in response. Content starts with: {excerpt}")]
    NoJson { excerpt: String },
    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Recover a JSON value from raw model output.
///
/// Models wrap JSON in markdown fences, prepend narration ("Here is the
/// JSON:"), or both. The recovery rules are applied in a fixed order:
/// strip a ```json fence (or a generic ``` fence) if present, then discard
/// anything before the first `{` or `[`, then decode. Anything that still
/// fails to decode is a `ParseError`; this function never guesses.
pub fn parse_json_response(content: &str) -> Result<Value, ParseError> {
    if content.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut cleaned = content.trim();

    if let Some(open) = cleaned.find("```json") {
        let rest = &cleaned[open + 7..];
        cleaned = match rest.find("```") {
            Some(close) => rest[..close].trim(),
            None => rest.trim(),
        };
    } else if cleaned.starts_with("```") {
        cleaned = match cleaned.split_once('\n') {
            Some((_, rest)) => rest,
            None => &cleaned[3..],
        };
        if cleaned.ends_with("```") {
            cleaned = match cleaned.rsplit_once('\n') {
                Some((head, _)) => head,
                None => &cleaned[..cleaned.len() - 3],
            };
        }
        cleaned = cleaned.trim();
    }

    if !cleaned.is_empty() && !cleaned.starts_with(['{', '[']) {
        match cleaned.find(['{', '[']) {
            Some(start) => cleaned = &cleaned[start..],
            None => {
                return Err(ParseError::NoJson {
                    excerpt: head(cleaned, 100),
                });
            }
        }
    }

    Ok(serde_json::from_str(cleaned)?)
}

fn head(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((at, _)) => text[..at].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_fenced_block() {
        let value = parse_json_response("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn parses_json_fence_without_closing_marker() {
        let value = parse_json_response("```json\n{\"a\": [1, 2]}").unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn parses_generic_fenced_block() {
        let value = parse_json_response("```\n[1, 2, 3]\n```").unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn discards_conversational_preamble() {
        let value = parse_json_response("Sure, here: {\"a\":1}").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn fence_anywhere_in_narration_is_found() {
        let raw = "Here is the result you asked for:\n```json\n{\"ok\": true}\n```\nLet me know!";
        let value = parse_json_response(raw).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(parse_json_response(""), Err(ParseError::Empty)));
    }

    #[test]
    fn text_without_json_fails_with_excerpt() {
        let err = parse_json_response("not json at all").unwrap_err();
        match err {
            ParseError::NoJson { excerpt } => assert_eq!(excerpt, "not json at all"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn excerpt_is_bounded_to_100_chars() {
        let long = "word ".repeat(100);
        let err = parse_json_response(&long).unwrap_err();
        match err {
            ParseError::NoJson { excerpt } => assert_eq!(excerpt.chars().count(), 100),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_payload_fails_as_decode_error() {
        let err = parse_json_response("{\"a\": [1, 2").unwrap_err();
        assert!(matches!(err, ParseError::Decode(_)));
    }

    #[test]
    fn bare_containers_decode() {
        assert_eq!(parse_json_response("[]").unwrap(), json!([]));
        assert_eq!(parse_json_response("  {\"k\": null} ").unwrap(), json!({"k": null}));
    }
}

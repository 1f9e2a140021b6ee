use serde_json::Value;

use super::Codec;
use crate::protocol::error::{EngineError, Result};
use crate::protocol::message::Id;

/// JSON codec for encoding/decoding messages.
///
/// # Example
///
/// ```
/// use rpcengine_common::{Codec, JsonCodec};
/// use serde_json::json;
///
/// let codec = JsonCodec;
/// let encoded = codec.encode(&json!({"id": 1, "method": "hello"})).unwrap();
/// let decoded = codec.decode(&encoded).unwrap();
/// assert_eq!(decoded["method"], "hello");
///
/// // Ids can be recovered from truncated input
/// let id = codec.recover_id(br#"{"id": 17, "method": "hel"#);
/// assert_eq!(id, Some(rpcengine_common::Id::Number(17)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(EngineError::Codec("empty input".into()));
        }
        Ok(serde_json::from_slice(data)?)
    }

    fn recover_id(&self, data: &[u8]) -> Option<Id> {
        scan_id(&String::from_utf8_lossy(data))
    }
}

/// Finds the `"id": <integer | simple string>` member of the top-level object
/// in possibly malformed JSON text. Keys inside nested values and inside
/// string contents are ignored.
fn scan_id(text: &str) -> Option<Id> {
    if !text.trim_start().starts_with('{') {
        return None;
    }

    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b'"' => {
                let end = string_end(bytes, i + 1)?;
                let key = &text[i + 1..end];
                i = end + 1;
                if depth == 1 && key == "id" {
                    if let Some(value) = text[i..].trim_start().strip_prefix(':') {
                        if let Some(id) = leading_id(value.trim_start()) {
                            return Some(id);
                        }
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the quote closing the string whose body starts at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn leading_id(s: &str) -> Option<Id> {
    if let Some(body) = s.strip_prefix('"') {
        let end = body.find('"')?;
        let candidate = &body[..end];
        // escaped strings cannot be echoed verbatim without a real parser
        if candidate.contains('\\') {
            return None;
        }
        return Some(Id::String(candidate.to_string()));
    }

    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '-'))
        .unwrap_or(s.len());
    if matches!(s[end..].chars().next(), Some('.' | 'e' | 'E')) {
        return None;
    }
    s[..end].parse::<i64>().ok().map(Id::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_number_id() {
        assert_eq!(scan_id(r#"{"id": 42, "method": "#), Some(Id::Number(42)));
        assert_eq!(scan_id(r#"{"method":"x","id":-3}"#), Some(Id::Number(-3)));
    }

    #[test]
    fn test_scan_string_id() {
        assert_eq!(scan_id(r#"{"id" : "abc", "#), Some(Id::from("abc")));
    }

    #[test]
    fn test_scan_rejects_fractional_and_escaped() {
        assert_eq!(scan_id(r#"{"id": 1.5}"#), None);
        assert_eq!(scan_id(r#"{"id": "a\"b"}"#), None);
    }

    #[test]
    fn test_scan_skips_unusable_occurrence() {
        assert_eq!(scan_id(r#"{"params": {"id": null}, "id": 8"#), Some(Id::Number(8)));
    }

    #[test]
    fn test_scan_ignores_nested_ids() {
        assert_eq!(
            scan_id(r#"{"method":"f","params":[{"id":3}],"id":10"#),
            Some(Id::Number(10))
        );
        assert_eq!(scan_id(r#"{"params": {"id": 3}, "method": "f"#), None);
        assert_eq!(scan_id(r#"[{"id": 3}"#), None);
    }

    #[test]
    fn test_scan_ignores_id_inside_strings() {
        assert_eq!(
            scan_id(r#"{"method": "say \"id\": 4", "id": 6"#),
            Some(Id::Number(6))
        );
        assert_eq!(scan_id(r#"{"params": ["\"id\": 4"], "method": "#), None);
    }

    #[test]
    fn test_scan_without_id() {
        assert_eq!(scan_id("not json at all"), None);
        assert_eq!(scan_id(""), None);
    }
}

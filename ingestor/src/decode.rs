use mongodb::bson::{self, Document};
use serde_json::Value;

use crate::errors::{Error, Result};

const PREVIEW_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Document(Document),
    /// Tombstone, blank payload, `null`, `{}`, `[]` or `""`.
    Empty,
}

/// Turns a message value into a BSON document, keeping every field as sent.
///
/// Unknown fields are kept and missing ones stay missing; the payload is not
/// checked against any schema.
pub fn decode(payload: Option<&[u8]>) -> Result<Decoded> {
    let bytes = match payload {
        Some(bytes) if !bytes.iter().all(is_json_whitespace) => bytes,
        _ => return Ok(Decoded::Empty),
    };

    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) if map.is_empty() => Ok(Decoded::Empty),
        Value::Object(map) => Ok(Decoded::Document(bson::to_document(&map)?)),
        Value::Null => Ok(Decoded::Empty),
        Value::Array(items) if items.is_empty() => Ok(Decoded::Empty),
        Value::String(s) if s.is_empty() => Ok(Decoded::Empty),
        other => Err(Error::Malformed(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

/// Lossy, length-limited rendering of a payload for log lines.
pub fn preview(payload: Option<&[u8]>) -> String {
    match payload {
        None => "<none>".to_string(),
        Some(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if text.chars().count() > PREVIEW_LEN {
                let cut: String = text.chars().take(PREVIEW_LEN).collect();
                format!("{}...", cut)
            } else {
                text.into_owned()
            }
        }
    }
}

fn is_json_whitespace(byte: &u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use mongodb::bson::Bson;

    fn decode_bytes(payload: &[u8]) -> Result<Decoded> {
        decode(Some(payload))
    }

    const SAMPLE: &str = r#"{"device_id":"D1151","battery_level":3.5,"temperature":22.0,"route_from":"Chennai, India","route_to":"London, UK","timestamp":"2025-01-01T00:00:00Z"}"#;

    #[test]
    fn test_decode_reading_keeps_fields_verbatim() {
        let Decoded::Document(doc) = decode_bytes(SAMPLE.as_bytes()).unwrap() else {
            panic!("expected a document");
        };

        assert_eq!(doc.get_str("device_id").unwrap(), "D1151");
        assert_eq!(doc.get_f64("battery_level").unwrap(), 3.5);
        assert_eq!(doc.get_f64("temperature").unwrap(), 22.0);
        assert_eq!(doc.get_str("route_from").unwrap(), "Chennai, India");
        assert_eq!(doc.get_str("route_to").unwrap(), "London, UK");
        assert_eq!(doc.get_str("timestamp").unwrap(), "2025-01-01T00:00:00Z");

        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "device_id",
                "battery_level",
                "temperature",
                "route_from",
                "route_to",
                "timestamp"
            ]
        );
    }

    #[test]
    fn test_decode_tolerates_unknown_and_missing_fields() {
        let payload = br#"{"device_id":"D1152","firmware":{"version":"1.2.0"},"tags":["cold-chain"]}"#;

        let Decoded::Document(doc) = decode_bytes(payload).unwrap() else {
            panic!("expected a document");
        };

        assert_eq!(doc.get_str("device_id").unwrap(), "D1152");
        assert_eq!(
            doc.get_document("firmware").unwrap().get_str("version").unwrap(),
            "1.2.0"
        );
        assert_eq!(
            doc.get_array("tags").unwrap(),
            &vec![Bson::String("cold-chain".to_string())]
        );
        assert!(doc.get("temperature").is_none());
    }

    #[test]
    fn test_decode_empty_payloads() {
        assert_eq!(decode(None).unwrap(), Decoded::Empty);
        assert_eq!(decode_bytes(b"").unwrap(), Decoded::Empty);
        assert_eq!(decode_bytes(b" \t\r\n").unwrap(), Decoded::Empty);
        assert_eq!(decode_bytes(b"null").unwrap(), Decoded::Empty);
        assert_eq!(decode_bytes(b"{}").unwrap(), Decoded::Empty);
        assert_eq!(decode_bytes(b"[]").unwrap(), Decoded::Empty);
        assert_eq!(decode_bytes(br#""""#).unwrap(), Decoded::Empty);
    }

    #[test]
    fn test_decode_malformed_payloads() {
        for payload in [
            &b"not json"[..],
            &b"{\"device_id\":"[..],
            &b"\xff\xfe\x00"[..],
            &b"42"[..],
            &b"[1, 2, 3]"[..],
            &b"true"[..],
            &b"\x0c"[..],
            &b"\x0c{}"[..],
        ] {
            let err = decode_bytes(payload).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Deserialization, "payload {:?}", payload);
        }
    }

    #[test]
    fn test_decode_floats_keep_exact_bits() {
        for value in [1.0715660391465826e-75, -1.81996730402717e-179, 0.1, 2.75] {
            let payload = format!(r#"{{"battery_level":{:?}}}"#, value);

            let Decoded::Document(doc) = decode_bytes(payload.as_bytes()).unwrap() else {
                panic!("expected a document");
            };

            let stored: f64 = doc.get_f64("battery_level").unwrap();
            assert_eq!(stored.to_bits(), f64::to_bits(value), "payload {}", payload);
        }
    }

    #[test]
    fn test_preview_truncates_long_payloads() {
        let long = "x".repeat(1000);
        let rendered = preview(Some(long.as_bytes()));

        assert_eq!(rendered.len(), PREVIEW_LEN + 3);
        assert!(rendered.ends_with("..."));
        assert_eq!(preview(None), "<none>");
        assert_eq!(preview(Some(&b"\xffok"[..])), "\u{fffd}ok");
    }
}

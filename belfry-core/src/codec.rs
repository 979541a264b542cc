//! Codec for action frames
//!
//! Inbound WebSocket text is decoded in two steps: parse to a generic JSON
//! value first, then shape-check into a [`SocketFrame`]. The split keeps
//! the two failure modes distinct, since they are handled differently at
//! the dispatch boundary:
//!
//! - not JSON at all → [`Error::Serialization`]
//! - JSON but not an action frame → [`Error::InvalidFrame`]
//!
//! Either way the frame is dropped with a log entry; decode failures never
//! tear down the connection.
//!
//! Extra fields in a frame are tolerated and ignored, so gateway-side
//! additions do not break older clients.

use crate::error::{Error, Result};
use crate::types::SocketFrame;

/// Encode a frame for the wire.
pub fn encode_frame(frame: &SocketFrame) -> Result<String> {
    serde_json::to_string(frame).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode one inbound text message into a frame.
///
/// # Examples
///
/// ```rust
/// use belfry_core::codec;
///
/// let frame = codec::decode_frame(r#"{"action":"notification","data":{}}"#).unwrap();
/// assert_eq!(frame.action, "notification");
/// ```
pub fn decode_frame(text: &str) -> Result<SocketFrame> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::Serialization(e.to_string()))?;

    if !value.is_object() {
        return Err(Error::InvalidFrame(format!(
            "expected an object, got {}",
            json_kind(&value)
        )));
    }
    if value.get("action").map(|a| a.is_string()) != Some(true) {
        return Err(Error::InvalidFrame(
            "missing or non-string action field".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| Error::InvalidFrame(e.to_string()))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::actions;
    use serde_json::json;

    #[test]
    fn test_encode_decode_frame() {
        let frame = SocketFrame::new(actions::SOCKET_ID, json!("s1"));
        let encoded = encode_frame(&frame).unwrap();
        let decoded = decode_frame(&encoded).unwrap();

        assert_eq!(decoded.action, "socketId");
        assert_eq!(decoded.data, json!("s1"));
    }

    #[test]
    fn test_decode_tolerates_extra_fields() {
        let decoded =
            decode_frame(r#"{"action":"privateMessage","data":{"x":1},"traceId":"t9"}"#).unwrap();
        assert_eq!(decoded.action, "privateMessage");
        assert_eq!(decoded.data["x"], 1);
    }

    #[test]
    fn test_decode_unknown_action_is_fine() {
        // Routing by action happens later; the codec accepts any tag.
        let decoded = decode_frame(r#"{"action":"somethingNew","data":null}"#).unwrap();
        assert_eq!(decoded.action, "somethingNew");
    }

    #[test]
    fn test_decode_invalid_json() {
        match decode_frame("not json at all") {
            Err(Error::Serialization(_)) => {}
            other => panic!("expected Serialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_object() {
        match decode_frame(r#"["an","array"]"#) {
            Err(Error::InvalidFrame(msg)) => assert!(msg.contains("array")),
            other => panic!("expected InvalidFrame error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_action() {
        match decode_frame(r#"{"data":{"x":1}}"#) {
            Err(Error::InvalidFrame(_)) => {}
            other => panic!("expected InvalidFrame error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_string_action() {
        match decode_frame(r#"{"action":42,"data":null}"#) {
            Err(Error::InvalidFrame(_)) => {}
            other => panic!("expected InvalidFrame error, got {:?}", other),
        }
    }
}

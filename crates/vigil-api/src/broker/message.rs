use bytes::Bytes;
use serde_json::Value;

use super::session::RawMessage;

/// Decoded message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Not valid JSON; the body as (lossy) UTF-8.
    Text(String),
}

impl Payload {
    /// JSON decode first, falling back to the raw text.
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// A message delivered to `on_message` listeners.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Payload,
    /// The undecoded body.
    pub raw: Bytes,
}

impl InboundMessage {
    pub fn decode(raw: RawMessage) -> Self {
        Self {
            payload: Payload::decode(&raw.payload),
            topic: raw.topic,
            raw: raw.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_bodies_decode_as_json() {
        let payload = Payload::decode(br#"{"origin":"device","deviceId":"d254"}"#);
        assert_eq!(
            payload,
            Payload::Json(json!({ "origin": "device", "deviceId": "d254" }))
        );
    }

    #[test]
    fn scalar_json_is_still_json() {
        assert_eq!(Payload::decode(b"42"), Payload::Json(json!(42)));
    }

    #[test]
    fn non_json_falls_back_to_text() {
        let payload = Payload::decode(b"not json");
        assert_eq!(payload, Payload::Text("not json".into()));
        assert!(payload.as_json().is_none());
    }
}

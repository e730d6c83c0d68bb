//! Try-on processing service protocol definitions.
//!
//! One request per connection. All payloads are JSON text frames over a
//! WebSocket.
//!
//! Message types:
//! - `ClientMessage`: client → service, exactly one per connection
//! - `ServerMessage`: service → client, zero or more `status` frames
//!   followed by one terminal `error` or `processed_image` frame

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_SERVICE_URL: &str = "ws://localhost:8765";
pub const CONNECT_TIMEOUT_MS: u64 = 10_000; // 10s
pub const REFERENCE_TTL_MS: u64 = 24 * 60 * 60 * 1_000; // 24h

/// Message `type` values the service may send.
pub const SERVER_MESSAGE_TYPES: &[&str] = &["status", "error", "processed_image"];

// ── Close codes ──────────────────────────────────────────────────────────────

pub mod close_codes {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const ABNORMAL: u16 = 1006;
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingType,

    #[error("unrecognized message type `{0}`")]
    UnknownType(String),

    #[error("invalid `{kind}` message: {source}")]
    InvalidFields {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("processed_image message carries neither image_base64 nor image_url")]
    MissingResult,

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

// ── Client → service ─────────────────────────────────────────────────────────

/// The single request a client sends after the channel opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Garment alone, processed against the service's default model image.
    Image { url: String },
    /// Garment plus an explicit model image supplied by the user.
    ProcessViton {
        model_image_base64: String,
        garment_url: String,
    },
}

impl ClientMessage {
    pub fn garment_url(&self) -> &str {
        match self {
            Self::Image { url } => url,
            Self::ProcessViton { garment_url, .. } => garment_url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::ProcessViton { .. } => "process_viton",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// ── Service → client ─────────────────────────────────────────────────────────

/// Result payload of a `processed_image` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessedImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProcessedImage {
    /// The result image, preferring inline base64 over a URL.
    pub fn result_image(&self) -> Option<&str> {
        non_empty(&self.image_base64).or_else(|| non_empty(&self.image_url))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Informational progress; never terminal.
    Status { message: String },
    /// The service gave up on the request.
    Error { message: String },
    ProcessedImage(ProcessedImage),
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn processed_base64(image_base64: impl Into<String>) -> Self {
        Self::ProcessedImage(ProcessedImage {
            image_base64: Some(image_base64.into()),
            image_url: None,
            message: None,
        })
    }

    /// Parse a text frame received from the service.
    ///
    /// Anything that is not a well-formed object with a known `type` and its
    /// required fields is rejected.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
        let Some(object) = value.as_object() else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = object
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_string();
        if !SERVER_MESSAGE_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        let message: Self = serde_json::from_value(value)
            .map_err(|source| ProtocolError::InvalidFields { kind, source })?;
        if let Self::ProcessedImage(image) = &message
            && image.result_image().is_none()
        {
            return Err(ProtocolError::MissingResult);
        }
        Ok(message)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Status { .. })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[test]
    fn legacy_request_wire_shape() {
        let msg = ClientMessage::Image {
            url: "https://x/a.jpg".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "image", "url": "https://x/a.jpg"}));
    }

    #[test]
    fn composite_request_wire_shape() {
        let msg = ClientMessage::ProcessViton {
            model_image_base64: "data:image/png;base64,AAAA".into(),
            garment_url: "https://x/b.jpg".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "process_viton",
                "model_image_base64": "data:image/png;base64,AAAA",
                "garment_url": "https://x/b.jpg",
            })
        );
        assert_eq!(msg.garment_url(), "https://x/b.jpg");
        assert_eq!(msg.kind(), "process_viton");
    }

    #[test]
    fn parses_status() {
        let msg = ServerMessage::parse(r#"{"type":"status","message":"queued"}"#).unwrap();
        assert_eq!(msg, ServerMessage::status("queued"));
        assert!(!msg.is_terminal());
    }

    #[test]
    fn parses_error() {
        let msg =
            ServerMessage::parse(r#"{"type":"error","message":"no garment detected"}"#).unwrap();
        assert_eq!(msg, ServerMessage::error("no garment detected"));
        assert!(msg.is_terminal());
    }

    #[test]
    fn processed_image_prefers_base64() {
        let msg = ServerMessage::parse(
            r#"{"type":"processed_image","image_base64":"AAAA","image_url":"https://r/x.png","message":"done"}"#,
        )
        .unwrap();
        let ServerMessage::ProcessedImage(image) = msg else {
            panic!("expected processed_image");
        };
        assert_eq!(image.result_image(), Some("AAAA"));
        assert_eq!(image.message.as_deref(), Some("done"));
    }

    #[test]
    fn processed_image_falls_back_to_url() {
        let msg =
            ServerMessage::parse(r#"{"type":"processed_image","image_url":"https://r/x.png"}"#)
                .unwrap();
        let ServerMessage::ProcessedImage(image) = msg else {
            panic!("expected processed_image");
        };
        assert_eq!(image.result_image(), Some("https://r/x.png"));
    }

    #[test]
    fn empty_base64_does_not_shadow_url() {
        let image = ProcessedImage {
            image_base64: Some(String::new()),
            image_url: Some("https://r/x.png".into()),
            message: None,
        };
        assert_eq!(image.result_image(), Some("https://r/x.png"));
    }

    #[rstest]
    #[case::not_json("not json at all")]
    #[case::array("[1,2,3]")]
    #[case::missing_type(r#"{"message":"hi"}"#)]
    #[case::non_string_type(r#"{"type":7}"#)]
    #[case::unknown_type(r#"{"type":"progress","message":"hi"}"#)]
    #[case::status_without_message(r#"{"type":"status"}"#)]
    #[case::error_with_number(r#"{"type":"error","message":5}"#)]
    #[case::no_result(r#"{"type":"processed_image","message":"done"}"#)]
    fn rejects_malformed_frames(#[case] text: &str) {
        assert!(ServerMessage::parse(text).is_err(), "accepted: {text}");
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        let err = ServerMessage::parse(r#"{"type":"ack"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "ack"));
    }

    #[test]
    fn service_side_encoding_round_trips_through_parse() {
        let text = ServerMessage::processed_base64("AAAA").to_json().unwrap();
        assert_eq!(
            ServerMessage::parse(&text).unwrap(),
            ServerMessage::processed_base64("AAAA")
        );
    }
}

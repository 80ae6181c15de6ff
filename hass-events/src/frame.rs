//! Raw push-event frames

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};

/// Placeholder the server writes for a missing value inside payload strings
pub const NONE_SENTINEL: &str = "\"NONE\"";

/// One message from the push-event stream, before type-specific decoding.
///
/// `payload` is itself JSON text; it has already been normalized with
/// [`normalize_payload`] when built through [`RawFrame::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub event_type: String,
    pub topic: String,
    pub payload: String,
}

impl RawFrame {
    pub fn new(
        event_type: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Parse the `data` field of a server-sent event
    pub fn parse(data: &str) -> DecodeResult<Self> {
        let mut frame: RawFrame =
            serde_json::from_str(data).map_err(|e| DecodeError::MalformedFrame(e.to_string()))?;
        if let Cow::Owned(normalized) = normalize_payload(&frame.payload) {
            frame.payload = normalized;
        }
        Ok(frame)
    }

    /// The payload decoded as JSON
    pub fn payload_json(&self) -> DecodeResult<serde_json::Value> {
        serde_json::from_str(&self.payload).map_err(|e| DecodeError::payload(&self.event_type, e))
    }

    /// Third topic segment, e.g. `Light` in `homeassistant/items/Light/state`
    pub fn target_name(&self) -> DecodeResult<&str> {
        self.topic
            .split('/')
            .nth(2)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DecodeError::InvalidTopic(self.topic.clone()))
    }
}

/// Replace the server's `"NONE"` placeholder with JSON `null`
pub fn normalize_payload(payload: &str) -> Cow<'_, str> {
    if payload.contains(NONE_SENTINEL) {
        Cow::Owned(payload.replace(NONE_SENTINEL, "null"))
    } else {
        Cow::Borrowed(payload)
    }
}

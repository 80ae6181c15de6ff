//! Error types for frame and event decoding

use thiserror::Error;

/// Errors that can occur while turning a frame into a domain event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame declares an event type no decoder is registered for
    #[error("Unknown event: {event_type} for topic {topic}")]
    UnknownEvent { event_type: String, topic: String },

    /// The frame itself is not a `{type, topic, payload}` JSON object
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The payload does not match the shape of its declared event type
    #[error("Malformed payload for {event_type}: {reason}")]
    MalformedPayload { event_type: String, reason: String },

    /// The topic does not carry a target name
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

impl DecodeError {
    pub(crate) fn payload(event_type: &str, reason: impl ToString) -> Self {
        DecodeError::MalformedPayload {
            event_type: event_type.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// An item definition the server would reject
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("{0} is not a valid item type")]
    UnknownType(String),

    #[error("{0} is not a valid unit dimension")]
    UnknownDimension(String),

    #[error("{0} is not a group function")]
    UnknownGroupFunction(String),

    /// Group type and function are only allowed on `Group` items
    #[error("Item type must be Group to carry group fields, is {0}")]
    NotAGroup(String),
}

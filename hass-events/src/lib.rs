//! # hass-events
//!
//! Parsing of the server's push-event frames and the typed events they map to.
//!
//! Each server-sent event carries a JSON object `{type, topic, payload}` whose
//! `payload` is itself JSON text. [`RawFrame::parse`] reads the outer object and
//! normalizes the server's `"NONE"` placeholder; [`EventDecoder::decode`] then
//! looks the `type` up in a fixed registry and builds a [`DomainEvent`].

pub mod decoder;
pub mod definitions;
pub mod error;
pub mod event;
pub mod frame;
pub mod value;

pub use decoder::EventDecoder;
pub use definitions::{validate_definition, GROUP_FUNCTIONS, ITEM_DIMENSIONS, ITEM_TYPES};
pub use error::{DecodeError, DecodeResult, DefinitionError};
pub use event::{
    ChannelTriggeredEvent, CommandEvent, DomainEvent, GroupFunction, ItemDefinition, StatusChangeEvent,
    StatusInfoEvent, ThingStatus, ValueChangeEvent, ValueUpdateEvent,
};
pub use frame::{normalize_payload, RawFrame, NONE_SENTINEL};
pub use value::{ItemValue, TypedValue};

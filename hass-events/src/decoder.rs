//! Event decoder registry
//!
//! Maps the `type` declared by a frame to the function that builds the
//! matching [`DomainEvent`]. Unregistered types are an error, not a skip.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{DecodeError, DecodeResult};
use crate::event::{
    ChannelTriggeredEvent, CommandEvent, DomainEvent, ItemDefinition, StatusChangeEvent,
    StatusInfoEvent, ThingStatus, ValueChangeEvent, ValueUpdateEvent,
};
use crate::frame::RawFrame;
use crate::value::{ItemValue, TypedValue};

type DecodeFn = fn(&RawFrame) -> DecodeResult<DomainEvent>;

/// Fixed registry of event constructors keyed by frame type name
pub struct EventDecoder {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl EventDecoder {
    pub fn new() -> Self {
        let entries: [(&'static str, DecodeFn); 9] = [
            ("ItemStateEvent", decode_item_state),
            ("ItemStateChangedEvent", decode_item_state_changed),
            ("ItemCommandEvent", decode_item_command),
            ("ItemAddedEvent", decode_item_added),
            ("ItemUpdatedEvent", decode_item_updated),
            ("ItemRemovedEvent", decode_item_removed),
            ("ThingStatusInfoEvent", decode_thing_status),
            ("ThingStatusInfoChangedEvent", decode_thing_status_changed),
            ("ChannelTriggeredEvent", decode_channel_triggered),
        ];

        Self {
            decoders: entries.into_iter().collect(),
        }
    }

    /// Decode a frame into its domain event
    pub fn decode(&self, frame: &RawFrame) -> DecodeResult<DomainEvent> {
        let decode = self
            .decoders
            .get(frame.event_type.as_str())
            .ok_or_else(|| DecodeError::UnknownEvent {
                event_type: frame.event_type.clone(),
                topic: frame.topic.clone(),
            })?;
        decode(frame)
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Registered type names, sorted
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.decoders.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn payload_as<T: DeserializeOwned>(frame: &RawFrame) -> DecodeResult<T> {
    serde_json::from_str(&frame.payload).map_err(|e| DecodeError::payload(&frame.event_type, e))
}

fn decode_item_state(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let name = frame.target_name()?.to_string();
    let typed: TypedValue = payload_as(frame)?;
    Ok(DomainEvent::ValueUpdate(ValueUpdateEvent {
        name,
        value: ItemValue::from_typed(&frame.event_type, &typed)?,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateChangedPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Option<String>,
    old_type: String,
    #[serde(default)]
    old_value: Option<String>,
}

fn decode_item_state_changed(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let name = frame.target_name()?.to_string();
    let payload: StateChangedPayload = payload_as(frame)?;

    let value = TypedValue {
        kind: payload.kind,
        value: payload.value,
    };
    let old_value = TypedValue {
        kind: payload.old_type,
        value: payload.old_value,
    };

    Ok(DomainEvent::ValueChange(ValueChangeEvent {
        name,
        value: ItemValue::from_typed(&frame.event_type, &value)?,
        old_value: ItemValue::from_typed(&frame.event_type, &old_value)?,
    }))
}

fn decode_item_command(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let name = frame.target_name()?.to_string();
    let typed: TypedValue = payload_as(frame)?;
    Ok(DomainEvent::Command(CommandEvent {
        name,
        value: ItemValue::from_typed(&frame.event_type, &typed)?,
    }))
}

fn decode_item_added(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    Ok(DomainEvent::ItemAdded(payload_as(frame)?))
}

fn decode_item_updated(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let (item, old_item): (ItemDefinition, ItemDefinition) = payload_as(frame)?;
    Ok(DomainEvent::ItemUpdated { item, old_item })
}

fn decode_item_removed(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    Ok(DomainEvent::ItemRemoved(payload_as(frame)?))
}

fn decode_thing_status(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let name = frame.target_name()?.to_string();
    let status: ThingStatus = payload_as(frame)?;
    Ok(DomainEvent::StatusInfo(StatusInfoEvent { name, status }))
}

fn decode_thing_status_changed(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let name = frame.target_name()?.to_string();
    let (status, old_status): (ThingStatus, ThingStatus) = payload_as(frame)?;
    Ok(DomainEvent::StatusChange(StatusChangeEvent {
        name,
        status,
        old_status,
    }))
}

#[derive(Deserialize)]
struct TriggerPayload {
    event: String,
    channel: String,
}

fn decode_channel_triggered(frame: &RawFrame) -> DecodeResult<DomainEvent> {
    let name = frame.target_name()?.to_string();
    let payload: TriggerPayload = payload_as(frame)?;
    Ok(DomainEvent::ChannelTriggered(ChannelTriggeredEvent {
        name,
        event: payload.event,
        channel: payload.channel,
    }))
}

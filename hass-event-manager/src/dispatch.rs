//! Dispatch bridge between the event stream and the rest of the application
//!
//! Frames are decoded, value updates are applied to the item registry and
//! every event is then published on the bus. A failure while handling one
//! frame is logged and never affects the next one.

use std::sync::Arc;

use hass_events::{DecodeError, DomainEvent, EventDecoder, RawFrame};
use hass_stream::ConnectionListener;
use item_registry::{EventBus, ItemRegistry, RegistryError};
use tracing::{debug, error, info, trace, warn};

pub struct DispatchBridge {
    decoder: EventDecoder,
    registry: Arc<ItemRegistry>,
    bus: EventBus,
}

impl DispatchBridge {
    pub fn new(registry: Arc<ItemRegistry>, bus: EventBus) -> Self {
        Self {
            decoder: EventDecoder::new(),
            registry,
            bus,
        }
    }

    /// Decode and dispatch one frame.
    pub fn handle_frame(&self, frame: &RawFrame) {
        match self.decoder.decode(frame) {
            Ok(event) => self.handle(event),
            Err(e @ DecodeError::UnknownEvent { .. }) => {
                error!(topic = %frame.topic, "{}", e);
            }
            Err(e) => {
                warn!(
                    event_type = %frame.event_type,
                    topic = %frame.topic,
                    "Dropping frame: {}",
                    e
                );
            }
        }
    }

    /// Apply a value update to the registry, then publish the event.
    ///
    /// Updates for items the registry does not know are still published.
    pub fn handle(&self, event: DomainEvent) {
        if let Some(update) = event.as_value_update() {
            match self.registry.set_value(&update.name, update.value.clone()) {
                Ok(changed) => {
                    trace!(name = %update.name, changed, "Applied value update");
                }
                Err(RegistryError::ItemNotFound(_)) => {}
                Err(e) => {
                    error!(name = %update.name, "Failed to apply value update: {}", e);
                }
            }
        }

        let receivers = self.bus.publish(event);
        trace!(receivers, "Published event");
    }
}

impl ConnectionListener for DispatchBridge {
    fn on_connected(&self) {
        info!("Connection online, dispatching events");
    }

    fn on_disconnected(&self) {
        debug!("Connection offline");
    }

    fn on_stream_event(&self, frame: RawFrame) {
        self.handle_frame(&frame);
    }
}

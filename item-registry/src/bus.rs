//! Broadcast bus for decoded events

use std::sync::Arc;

use hass_events::DomainEvent;
use tokio::sync::broadcast;

/// Publishes events to every current subscriber.
///
/// Slow subscribers lag and lose the oldest events rather than blocking the
/// publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: DomainEvent) -> usize {
        let name = event.name().to_string();
        let kind = event.kind();
        match self.sender.send(Arc::new(event)) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(name = %name, kind, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

//! Blocking access to published events
//!
//! Every iterator of one manager reads from the same bounded queue, so each
//! event is delivered once. A filtered iterator discards the events it does
//! not match; give it its own manager if other readers need them.

use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use hass_events::{DomainEvent, ItemValue};

/// Shared receiving end of the facade's event queue
pub(crate) type EventQueue = Arc<Mutex<mpsc::Receiver<Arc<DomainEvent>>>>;

/// Which events an [`EventManagerIterator`] yields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    name: Option<String>,
    kinds: Vec<String>,
}

impl EventFilter {
    /// Matches every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Only events about the item, thing or channel called `name`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Also accept events of `kind`, see [`DomainEvent::kind`]. Without any
    /// kind every kind matches.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    pub fn matches(&self, event: &DomainEvent) -> bool {
        let name_matches = self.name.as_deref().map_or(true, |name| event.name() == name);
        let kind_matches = self.kinds.is_empty() || self.kinds.iter().any(|k| k == event.kind());
        name_matches && kind_matches
    }
}

/// Blocking iterator over published events
#[derive(Clone)]
pub struct EventManagerIterator {
    rx: EventQueue,
    filter: EventFilter,
}

impl EventManagerIterator {
    pub(crate) fn new(rx: EventQueue) -> Self {
        Self {
            rx,
            filter: EventFilter::all(),
        }
    }

    /// Same queue, restricted to `filter`
    pub fn filtered(&self, filter: EventFilter) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
            filter,
        }
    }

    /// Same queue, only events about `name`
    pub fn for_item(&self, name: &str) -> Self {
        self.filtered(self.filter.clone().name(name))
    }

    /// Same queue, only events of `kind`
    pub fn of_kind(&self, kind: &str) -> Self {
        self.filtered(self.filter.clone().kind(kind))
    }

    /// Block until a matching event arrives. `None` once the manager is gone.
    pub fn recv(&self) -> Option<Arc<DomainEvent>> {
        let rx = self.rx.lock().ok()?;
        loop {
            let event = rx.recv().ok()?;
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Block until a matching event arrives or `timeout` expires.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Arc<DomainEvent>> {
        let deadline = Instant::now() + timeout;
        let rx = self.rx.lock().ok()?;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let event = rx.recv_timeout(remaining).ok()?;
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// First matching event already queued, without blocking
    pub fn try_recv(&self) -> Option<Arc<DomainEvent>> {
        let rx = self.rx.lock().ok()?;
        rx.try_iter().find(|event| self.filter.matches(event))
    }

    /// Every matching event queued right now
    pub fn drain(&self) -> Vec<Arc<DomainEvent>> {
        match self.rx.lock() {
            Ok(rx) => rx.try_iter().filter(|event| self.filter.matches(event)).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Value carried by the next update of item `name`
    pub fn next_value(&self, name: &str, timeout: Duration) -> Option<ItemValue> {
        let updates = self.for_item(name).of_kind("value_update");
        let event = updates.recv_timeout(timeout)?;
        event.as_value_update().map(|update| update.value.clone())
    }
}

impl Iterator for EventManagerIterator {
    type Item = Arc<DomainEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

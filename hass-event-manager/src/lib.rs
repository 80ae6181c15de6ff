//! # hass-sdk event manager
//!
//! A sync-first facade over the hass-sdk connection core.
//!
//! ## Overview
//!
//! [`HassEventManager`] owns a dedicated event loop thread running the
//! connection supervisor. Frames from the server's event stream go through
//! the [`DispatchBridge`]:
//!
//! 1. the frame is decoded into a typed `DomainEvent`
//! 2. value updates are written to the local `ItemRegistry`
//! 3. the event is published on the `EventBus`
//!
//! Blocking callers get their results through a thread-to-loop handoff,
//! so connection state is only ever mutated on the loop thread.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hass_event_manager::{logging, HassEventManager};
//! use hass_stream::ConnectionConfig;
//!
//! logging::init_logging_from_env()?;
//!
//! let config = ConnectionConfig::default().with_host("hass.local", 8123);
//! let manager = HassEventManager::with_config(config)?;
//! manager.start()?;
//!
//! for event in manager.iter().of_kind("value_update") {
//!     if let Some(update) = event.as_value_update() {
//!         println!("{} = {}", update.name, update.value);
//!     }
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod iter;
pub mod logging;
pub mod manager;
mod ping;
mod worker;

pub use dispatch::DispatchBridge;
pub use error::{EventManagerError, Result};
pub use iter::{EventFilter, EventManagerIterator};
pub use manager::HassEventManager;

//! Local item registry and event bus
//!
//! # Architecture
//!
//! ```text
//! ItemRegistry
//!     └── items: RwLock<HashMap<name, Item>>
//!
//! EventBus
//!     └── broadcast::Sender<Arc<DomainEvent>>
//!             └── one Receiver per subscriber
//! ```

pub mod bus;
pub mod error;
pub mod registry;

pub use bus::EventBus;
pub use error::{RegistryError, Result};
pub use registry::{Item, ItemRegistry};

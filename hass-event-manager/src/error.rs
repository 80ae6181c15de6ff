use std::time::Duration;

use hass_stream::ConnectionError;
use item_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur in the event manager
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// Error from the connection core
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Error from the local item registry
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The event loop thread or its runtime could not be started
    #[error("Failed to start event loop: {0}")]
    RuntimeStartup(String),

    /// The event loop thread has exited
    #[error("Event loop is no longer running")]
    WorkerGone,

    /// The server did not come online in time
    #[error("Server not online after {0:?}")]
    ConnectTimeout(Duration),
}

/// Result type for event manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;

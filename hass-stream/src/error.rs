//! Error types for the hass-stream crate.

use hass_events::DefinitionError;
use rest_client::RestError;

/// Errors surfaced by the connection core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// A request failed, see [`RestError`] for the classification
    #[error(transparent)]
    Rest(#[from] RestError),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Item names must be non-empty path segments
    #[error("Invalid item name: {0:?}")]
    InvalidItemName(String),

    /// The server would reject this item definition
    #[error("Invalid item definition: {0}")]
    InvalidItemDefinition(#[from] DefinitionError),

    /// Metadata namespaces must be non-empty path segments
    #[error("Invalid metadata namespace: {0:?}")]
    InvalidNamespace(String),

    /// The supervisor task is no longer running
    #[error("Connection supervisor has shut down")]
    SupervisorGone,
}

impl ConnectionError {
    /// Whether this error means the session was found to be broken
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ConnectionError::Rest(e) if e.is_disconnect_signal())
    }
}

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rest_client::Method;

    #[test]
    fn test_disconnect_classification() {
        let not_ready = ConnectionError::from(RestError::NotReady {
            status: 503,
            method: Method::Get,
            url: "http://localhost:8123/rest/uuid/".to_string(),
        });
        assert!(not_ready.is_disconnect());

        assert!(!ConnectionError::from(RestError::NotConfigured).is_disconnect());
        assert!(!ConnectionError::Configuration("bad".into()).is_disconnect());
        assert!(!ConnectionError::SupervisorGone.is_disconnect());
        assert!(!ConnectionError::from(DefinitionError::UnknownType("Lamp".into())).is_disconnect());
    }

    #[test]
    fn test_rest_errors_display_transparently() {
        let err = ConnectionError::from(RestError::NotConfigured);
        assert_eq!(err.to_string(), RestError::NotConfigured.to_string());
    }
}

//! Error types and transport-failure classification for the REST client

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::request::Method;

/// Every outcome of a REST call that is not a usable response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestError {
    /// No session exists yet (empty host or connection not started)
    #[error("Connection to the server is not set up")]
    NotConfigured,

    /// Transport-level failure: refused, reset, truncated payload, timeout
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// The server answered with a 5xx status
    #[error("Server not ready: status {status} for {method} {url}")]
    NotReady {
        status: u16,
        method: Method,
        url: String,
    },

    /// The server answered with an error status on a call that required success
    #[error("Expected success but got status {status} for {method} {url}")]
    UnexpectedFailure {
        status: u16,
        method: Method,
        url: String,
    },

    /// Request paths are relative to the REST root and must not start with `/`
    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    /// The response body could not be decoded into the requested shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Any failure that is not a disconnect
    #[error("Request failed: {0}")]
    Request(String),

    /// The session could not be built from the supplied options
    #[error("Invalid session configuration: {0}")]
    Session(String),
}

impl RestError {
    /// Whether this error means the session must be considered broken
    pub fn is_disconnect_signal(&self) -> bool {
        matches!(
            self,
            RestError::Disconnected(_) | RestError::NotReady { .. } | RestError::UnexpectedFailure { .. }
        )
    }
}

/// Convenience type alias for Results using RestError.
pub type Result<T> = std::result::Result<T, RestError>;

/// Decide whether a `reqwest` failure is a disconnect.
///
/// Connect failures, timeouts and body/payload errors always are. Anything
/// else is a disconnect only when an I/O error with a connection-loss kind
/// sits somewhere in its source chain.
pub fn is_disconnect_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() || err.is_body() {
        return true;
    }

    matches!(
        io_error_kind(err),
        Some(
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::TimedOut
        )
    )
}

/// Map a `reqwest` failure onto the closed error enumeration
pub fn classify(err: &reqwest::Error) -> RestError {
    if is_disconnect_error(err) {
        RestError::Disconnected(err.to_string())
    } else {
        RestError::Request(err.to_string())
    }
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = current.source();
    }
    None
}

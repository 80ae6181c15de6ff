//! Connection core for hass-sdk
//!
//! Keeps a verified HTTP session to the server, consumes the server-sent
//! event stream and reconnects with exponential backoff whenever a request
//! or the stream reports the session as broken.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hass_stream::{ConnectionConfig, ConnectionListener, ConnectionSupervisor};
//! use hass_events::RawFrame;
//!
//! struct Printer;
//!
//! impl ConnectionListener for Printer {
//!     fn on_stream_event(&self, frame: RawFrame) {
//!         println!("{} {}", frame.event_type, frame.topic);
//!     }
//! }
//!
//! # async fn example() -> hass_stream::Result<()> {
//! let handle = ConnectionSupervisor::spawn(ConnectionConfig::default(), Arc::new(Printer))?;
//! handle.start().await?;
//! handle.wait_until_online().await?;
//! handle.api().send_command("Light", "ON").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod listener;
pub mod state;
pub mod stream;
pub mod transport;

pub use api::{validate_item_name, validate_namespace, RestApi};
pub use backoff::BackoffTimer;
pub use config::{ConnectionConfig, PingConfig};
pub use connection::{ConnectionHandle, ConnectionSupervisor};
pub use error::{ConnectionError, Result};
pub use handshake::ServerInfo;
pub use listener::{ConnectionListener, NoopListener};
pub use state::{ConnectionStatus, HandshakePhase};
pub use transport::Transport;

pub use rest_client::{Method, RestError, RestRequest, RestResponse};

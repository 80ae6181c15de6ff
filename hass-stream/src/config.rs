//! Configuration types for the connection core
//!
//! `ConnectionConfig` controls where and how the connection is made, the
//! reconnect backoff bounds, read-only mode and the round-trip ping. It can
//! be built in code or loaded from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rest_client::SessionOptions;
use serde::{Deserialize, Serialize};

use crate::api::validate_item_name;
use crate::error::{ConnectionError, Result};

/// Configuration for the connection supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host. An empty host disables the connection.
    /// Default: "localhost"
    pub host: String,

    /// Default: 8123
    pub port: u16,

    /// Basic-auth user, credentials are only sent when non-empty
    pub user: String,

    pub password: String,

    /// CA certificate (PEM). When set the connection uses https.
    pub ca_cert: Option<PathBuf>,

    /// Default: true
    pub cert_verify: bool,

    /// Never change anything on the server. Can be toggled at runtime.
    /// Default: false
    pub listen_only: bool,

    /// Block startup of the sync facade until the connection is online
    /// Default: true
    pub wait_for_homeassistant: bool,

    /// Upper bound for the startup wait
    /// Default: 60 seconds
    #[serde(with = "duration_secs")]
    pub startup_timeout: Duration,

    /// Shortest wait between two connection attempts
    /// Default: 1 second
    #[serde(with = "duration_secs")]
    pub backoff_floor: Duration,

    /// Longest wait between two connection attempts
    /// Default: 600 seconds
    #[serde(with = "duration_secs")]
    pub backoff_ceiling: Duration,

    /// TCP connect timeout. There is no total timeout, the event stream never ends.
    /// Default: 10 seconds
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Namespace of the subscribed topics
    /// Default: "homeassistant"
    pub event_prefix: String,

    /// Capacity of the event bus
    /// Default: 1000
    pub event_buffer_size: usize,

    pub ping: PingConfig,
}

/// Round-trip measurement through a number item on the server
///
/// Every `interval` the last measured round trip in milliseconds is posted
/// to `entity`; the time until the server echoes the update back is the
/// next measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Default: true
    pub enabled: bool,

    /// Name of the number item that receives the ping
    /// Default: "HassSdk_Ping"
    pub entity: String,

    /// Default: 10 seconds
    #[serde(with = "duration_secs")]
    pub interval: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entity: "HassSdk_Ping".to_string(),
            interval: Duration::from_secs(10),
        }
    }
}

impl PingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn new(entity: impl Into<String>, interval: Duration) -> Self {
        Self {
            enabled: true,
            entity: entity.into(),
            interval,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: String::new(),
            password: String::new(),
            ca_cert: None,
            cert_verify: true,
            listen_only: false,
            wait_for_homeassistant: true,
            startup_timeout: Duration::from_secs(60),
            backoff_floor: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
            event_prefix: "homeassistant".to_string(),
            event_buffer_size: 1000,
            ping: PingConfig::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only configuration that never waits for the server on startup
    pub fn listen_only() -> Self {
        Self {
            listen_only: true,
            wait_for_homeassistant: false,
            ..Default::default()
        }
    }

    /// Short backoff bounds, for local servers and tests
    pub fn fast_reconnect() -> Self {
        Self {
            backoff_floor: Duration::from_millis(100),
            backoff_ceiling: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConnectionError::Configuration(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConnectionError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConnectionError::Configuration(
                "Port must be greater than 0".to_string(),
            ));
        }

        if self.backoff_floor.is_zero() {
            return Err(ConnectionError::Configuration(
                "Backoff floor must be greater than 0".to_string(),
            ));
        }

        if self.backoff_floor > self.backoff_ceiling {
            return Err(ConnectionError::Configuration(
                "Invalid backoff: floor must not exceed ceiling".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(ConnectionError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_prefix.is_empty() {
            return Err(ConnectionError::Configuration(
                "Event prefix must not be empty".to_string(),
            ));
        }

        if self.ping.enabled {
            if self.ping.interval.is_zero() {
                return Err(ConnectionError::Configuration(
                    "Ping interval must be greater than 0".to_string(),
                ));
            }
            validate_item_name(&self.ping.entity).map_err(|_| {
                ConnectionError::Configuration(format!(
                    "Ping entity {:?} is not a valid item name",
                    self.ping.entity
                ))
            })?;
        }

        Ok(())
    }

    /// Whether a host is configured at all
    pub fn is_enabled(&self) -> bool {
        !self.host.is_empty()
    }

    /// Session options for the REST client
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            ca_cert: self.ca_cert.clone(),
            cert_verify: self.cert_verify,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Topic patterns of the push-event subscription
    pub fn topics(&self) -> Vec<String> {
        let prefix = &self.event_prefix;
        vec![
            format!("{prefix}/items/"),
            format!("{prefix}/channels/"),
            format!("{prefix}/things/*/status"),
            format!("{prefix}/things/*/statuschanged"),
        ]
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_backoff(mut self, floor: Duration, ceiling: Duration) -> Self {
        self.backoff_floor = floor;
        self.backoff_ceiling = ceiling;
        self
    }

    pub fn with_listen_only(mut self, listen_only: bool) -> Self {
        self.listen_only = listen_only;
        self
    }

    pub fn with_ping(mut self, ping: PingConfig) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_wait_for_homeassistant(mut self, wait: bool, timeout: Duration) -> Self {
        self.wait_for_homeassistant = wait;
        self.startup_timeout = timeout;
        self
    }
}

/// Durations as (fractional) seconds in config files
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

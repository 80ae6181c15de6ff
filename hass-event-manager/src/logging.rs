//! Logging setup for applications embedding hass-sdk
//!
//! Libraries in this workspace only emit `tracing` events. This module
//! installs a subscriber for them. Per-frame stream logging is emitted at
//! debug level under the `hass_stream::events` target and can be enabled on
//! its own, e.g. `HASS_LOG_LEVEL=info,hass_stream::events=debug`.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with thread ids and source locations
    Debug,
    /// One JSON object per line, for log collectors
    Json,
}

impl LoggingMode {
    /// Parse a `HASS_LOG_MODE` value
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" => Some(LoggingMode::Silent),
            "development" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            "json" => Some(LoggingMode::Json),
            _ => None,
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Install a global subscriber for `mode`.
///
/// # Environment Variables
///
/// - `HASS_LOG_LEVEL`: filter directives, e.g. `debug` or `hass_stream=trace`
/// - `RUST_LOG`: used when `HASS_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => Registry::default()
            .with(fmt::layer().with_target(false).compact())
            .with(create_env_filter("info")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(create_env_filter("debug")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(create_env_filter("info")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
    }
}

/// Initialize logging from `HASS_LOG_MODE` (silent, development, debug, json).
///
/// Unset means silent. An unknown mode is an error.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("HASS_LOG_MODE") {
        Ok(name) => LoggingMode::from_name(&name)
            .ok_or_else(|| LoggingError::InvalidEnv(format!("HASS_LOG_MODE={name}")))?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

/// `HASS_LOG_LEVEL`, then `RUST_LOG`, then `default_level`
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("HASS_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{directives}: {e}")))
}

/// Whether a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

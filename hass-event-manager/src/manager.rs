//! Sync-first facade over the connection core
//!
//! Provides a fully synchronous API. All async work happens on the event
//! loop thread owned by the manager.

use std::future::Future;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use hass_events::{DomainEvent, ItemDefinition};
use hass_stream::{validate_item_name, ConnectionConfig, ConnectionStatus, RestApi};
use item_registry::{EventBus, ItemRegistry};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};

use crate::dispatch::DispatchBridge;
use crate::error::{EventManagerError, Result};
use crate::iter::{EventManagerIterator, EventQueue};
use crate::worker::{spawn_event_loop, EventLoop};

/// Sync-first manager for one server connection
///
/// Owns the event loop thread, the local item registry and the event bus.
/// Blocking methods must not be called from inside an async runtime.
///
/// # Example
///
/// ```rust,ignore
/// use hass_event_manager::HassEventManager;
///
/// let manager = HassEventManager::new()?;
/// manager.start()?;
///
/// manager.post_update("Temperature", "21.5")?;
///
/// for event in manager.iter() {
///     println!("Event: {:?}", event);
/// }
/// ```
pub struct HassEventManager {
    config: ConnectionConfig,
    registry: Arc<ItemRegistry>,
    bus: EventBus,
    event_rx: EventQueue,
    ping: Option<watch::Receiver<Option<Duration>>>,
    event_loop: EventLoop,
}

impl HassEventManager {
    /// Create a manager with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a manager. The connection is not started yet.
    pub fn with_config(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ItemRegistry::new());
        let bus = EventBus::new(config.event_buffer_size);
        let bridge = Arc::new(DispatchBridge::new(registry.clone(), bus.clone()));

        let (event_tx, event_rx) = mpsc::sync_channel(config.event_buffer_size);
        let event_loop = spawn_event_loop(config.clone(), bridge, bus.subscribe(), event_tx)?;
        let ping = config
            .ping
            .enabled
            .then(|| event_loop.start_ping(config.ping.clone(), bus.clone()));

        Ok(Self {
            config,
            registry,
            bus,
            event_rx: Arc::new(Mutex::new(event_rx)),
            ping,
            event_loop,
        })
    }

    /// Start (or restart) the connection.
    ///
    /// With `wait_for_homeassistant` set this blocks until the server is
    /// online, failing with [`EventManagerError::ConnectTimeout`] after
    /// `startup_timeout`. The connection keeps retrying in the background
    /// either way.
    pub fn start(&self) -> Result<()> {
        let connection = self.event_loop.connection().clone();
        self.event_loop.run(async move { connection.start().await })??;

        if self.config.wait_for_homeassistant && self.config.is_enabled() {
            self.wait_until_online(self.config.startup_timeout)?;
        }
        Ok(())
    }

    /// Stop the connection. No reconnect is attempted until `start`.
    pub fn stop(&self) -> Result<()> {
        let connection = self.event_loop.connection().clone();
        self.event_loop.run(async move { connection.stop().await })??;
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        self.event_loop.connection().is_online()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.event_loop.connection().status()
    }

    /// Block until the connection is online or `timeout` expires.
    pub fn wait_until_online(&self, timeout: Duration) -> Result<()> {
        let connection = self.event_loop.connection().clone();
        self.event_loop
            .run(async move { tokio::time::timeout(timeout, connection.wait_until_online()).await })?
            .map_err(|_| EventManagerError::ConnectTimeout(timeout))??;
        Ok(())
    }

    /// Switch read-only mode at runtime
    pub fn set_listen_only(&self, listen_only: bool) -> Result<()> {
        self.event_loop.connection().set_read_only(listen_only)?;
        Ok(())
    }

    /// Last measured round trip to the server, `None` until the first ping
    /// echo arrives or when the ping is disabled
    pub fn last_ping(&self) -> Option<Duration> {
        self.ping.as_ref().and_then(|ping| *ping.borrow())
    }

    /// Local item registry, updated before events are published
    pub fn registry(&self) -> &Arc<ItemRegistry> {
        &self.registry
    }

    /// Subscribe to published events from async code
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.bus.subscribe()
    }

    /// Blocking iterator over published events
    ///
    /// Events are queued from the moment the manager is created, up to
    /// `event_buffer_size`; further events are dropped until read.
    pub fn iter(&self) -> EventManagerIterator {
        EventManagerIterator::new(Arc::clone(&self.event_rx))
    }

    /// Post a state update. Returns once the request is queued.
    pub fn post_update(&self, name: &str, state: &str) -> Result<()> {
        validate_item_name(name)?;
        let (name, state) = (name.to_string(), state.to_string());
        self.submit(move |api| async move { api.post_update(&name, &state).await });
        Ok(())
    }

    /// Send a command. Returns once the request is queued.
    pub fn send_command(&self, name: &str, command: &str) -> Result<()> {
        validate_item_name(name)?;
        let (name, command) = (name.to_string(), command.to_string());
        self.submit(move |api| async move { api.send_command(&name, &command).await });
        Ok(())
    }

    pub fn get_item(&self, name: &str) -> Result<Option<ItemDefinition>> {
        let name = name.to_string();
        self.call(move |api| async move { api.get_item(&name).await })
    }

    pub fn item_exists(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.call(move |api| async move { api.item_exists(&name).await })
    }

    /// Create or replace an item, `false` when suppressed or refused
    pub fn create_item(&self, item: ItemDefinition) -> Result<bool> {
        self.call(move |api| async move { api.create_item(&item).await })
    }

    pub fn remove_item(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.call(move |api| async move { api.remove_item(&name).await })
    }

    /// Add or replace item metadata, `false` when suppressed or refused
    pub fn set_metadata(
        &self,
        name: &str,
        namespace: &str,
        value: &str,
        config: Map<String, Value>,
    ) -> Result<bool> {
        let (name, namespace, value) = (name.to_string(), namespace.to_string(), value.to_string());
        self.call(move |api| async move { api.set_metadata(&name, &namespace, &value, config).await })
    }

    pub fn remove_metadata(&self, name: &str, namespace: &str) -> Result<bool> {
        let (name, namespace) = (name.to_string(), namespace.to_string());
        self.call(move |api| async move { api.remove_metadata(&name, &namespace).await })
    }

    pub fn get_uuid(&self) -> Result<String> {
        self.call(|api| async move { api.get_uuid().await })
    }

    pub fn get_root(&self) -> Result<Option<Value>> {
        self.call(|api| async move { api.get_root().await })
    }

    fn api(&self) -> RestApi {
        self.event_loop.connection().api()
    }

    /// Run an API call on the loop and wait for its result.
    fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(RestApi) -> Fut,
        Fut: Future<Output = hass_stream::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        Ok(self.event_loop.run(f(self.api()))??)
    }

    /// Run an API call on the loop, logging its failure.
    fn submit<F, Fut>(&self, f: F)
    where
        F: FnOnce(RestApi) -> Fut,
        Fut: Future<Output = hass_stream::Result<()>> + Send + 'static,
    {
        let call = f(self.api());
        self.event_loop.submit(async move {
            if let Err(e) = call.await {
                tracing::warn!("Request failed: {}", e);
            }
        });
    }
}

impl Drop for HassEventManager {
    fn drop(&mut self) {
        tracing::debug!(
            "HassEventManager dropping, {} items in registry",
            self.registry.len()
        );
    }
}

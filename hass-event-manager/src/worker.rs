//! Event loop thread
//!
//! Spawns a thread with its own single-threaded tokio runtime. The
//! connection supervisor and all of its tasks live on that runtime, so
//! connection state is only ever touched from this one thread. Callers on
//! other threads submit futures to the loop and block on the result.

use std::future::Future;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hass_events::DomainEvent;
use hass_stream::{
    ConnectionConfig, ConnectionHandle, ConnectionListener, ConnectionSupervisor, PingConfig,
};
use item_registry::EventBus;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, watch};

use crate::error::{EventManagerError, Result};
use crate::ping::run_ping;

/// Running event loop thread
pub(crate) struct EventLoop {
    runtime: Handle,
    connection: ConnectionHandle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Start the loop thread, the connection supervisor on it, and a task
/// forwarding bus events into `event_tx`.
pub(crate) fn spawn_event_loop(
    config: ConnectionConfig,
    listener: Arc<dyn ConnectionListener>,
    events: broadcast::Receiver<Arc<DomainEvent>>,
    event_tx: SyncSender<Arc<DomainEvent>>,
) -> Result<EventLoop> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(Handle, ConnectionHandle)>>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let thread = thread::Builder::new()
        .name("hass-event-loop".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create tokio runtime for event loop: {}", e);
                    let _ = ready_tx.send(Err(EventManagerError::RuntimeStartup(e.to_string())));
                    return;
                }
            };

            rt.block_on(async move {
                let connection = match ConnectionSupervisor::spawn(config, listener) {
                    Ok(connection) => connection,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                tokio::spawn(forward_events(events, event_tx));

                if ready_tx.send(Ok((Handle::current(), connection))).is_err() {
                    return;
                }

                tracing::info!("Event loop started");
                let _ = shutdown_rx.await;
            });

            tracing::info!("Event loop shut down");
        })
        .map_err(|e| EventManagerError::RuntimeStartup(e.to_string()))?;

    let (runtime, connection) = ready_rx
        .recv()
        .map_err(|_| EventManagerError::RuntimeStartup("event loop exited during startup".to_string()))??;

    Ok(EventLoop {
        runtime,
        connection,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

/// Copy bus events into the bounded queue read by the blocking iterators.
async fn forward_events(
    mut events: broadcast::Receiver<Arc<DomainEvent>>,
    event_tx: SyncSender<Arc<DomainEvent>>,
) {
    loop {
        match events.recv().await {
            Ok(event) => match event_tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::warn!(name = %event.name(), "Event queue full, dropping event");
                }
                Err(TrySendError::Disconnected(_)) => break,
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Event forwarding lagged, {} events dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::debug!("Event forwarding stopped");
}

impl EventLoop {
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Run `future` on the loop and block the calling thread until it
    /// completes. Must not be called from the loop thread itself.
    pub fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let _ = tx.send(future.await);
        });
        rx.blocking_recv().map_err(|_| EventManagerError::WorkerGone)
    }

    /// Start the round-trip ping on the loop. Measurements are published on
    /// the returned channel.
    pub fn start_ping(&self, config: PingConfig, bus: EventBus) -> watch::Receiver<Option<Duration>> {
        let (latest_tx, latest_rx) = watch::channel(None);
        self.runtime
            .spawn(run_ping(config, self.connection.clone(), bus, latest_tx));
        latest_rx
    }

    /// Run `future` on the loop without waiting for it.
    pub fn submit<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(future);
    }

    /// Stop the connection and join the loop thread. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };

        let connection = self.connection.clone();
        if let Err(e) = self.run(async move { connection.stop().await }) {
            tracing::debug!("Event loop gone before shutdown: {}", e);
        }

        let _ = shutdown.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Event loop thread panicked");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

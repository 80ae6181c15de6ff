//! Round-trip ping through a number item on the server
//!
//! Runs on the event loop while the manager lives. Each round posts the
//! previous measurement to the ping item and times how long the server takes
//! to echo the update back on the event stream.

use std::sync::Arc;
use std::time::Duration;

use hass_events::DomainEvent;
use hass_stream::{ConnectionHandle, PingConfig};
use item_registry::EventBus;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

pub(crate) async fn run_ping(
    config: PingConfig,
    connection: ConnectionHandle,
    bus: EventBus,
    latest: watch::Sender<Option<Duration>>,
) {
    debug!(entity = %config.entity, interval = ?config.interval, "Ping started");

    loop {
        if connection.wait_until_online().await.is_err() {
            break;
        }
        tokio::time::sleep(config.interval).await;

        let previous = *latest.borrow();
        if let Some(rtt) = ping_once(&config, &connection, previous, bus.subscribe()).await {
            debug!("Ping {:.1} ms", rtt.as_secs_f64() * 1000.0);
            latest.send_replace(Some(rtt));
        }
    }

    debug!("Ping stopped");
}

/// One round; `None` when it was skipped or the echo never came.
async fn ping_once(
    config: &PingConfig,
    connection: &ConnectionHandle,
    previous: Option<Duration>,
    mut events: broadcast::Receiver<Arc<DomainEvent>>,
) -> Option<Duration> {
    let status = connection.status();
    if !status.online || status.read_only {
        return None;
    }

    let api = connection.api();
    match api.item_exists(&config.entity).await {
        Ok(true) => {}
        Ok(false) => {
            debug!("Ping item {} does not exist, skipping", config.entity);
            return None;
        }
        Err(e) => {
            debug!("Ping skipped: {}", e);
            return None;
        }
    }

    let value = ping_value(previous);
    let sent = Instant::now();
    if let Err(e) = api.post_update(&config.entity, &value).await {
        warn!("Failed to post ping: {}", e);
        return None;
    }

    match tokio::time::timeout(config.interval, echo(&mut events, &config.entity)).await {
        Ok(true) => Some(sent.elapsed()),
        Ok(false) => None,
        Err(_) => {
            debug!("No ping echo within {:?}", config.interval);
            None
        }
    }
}

/// The previous round trip in milliseconds, 0 before the first echo
fn ping_value(previous: Option<Duration>) -> String {
    match previous {
        Some(rtt) => format!("{:.1}", rtt.as_secs_f64() * 1000.0),
        None => "0".to_string(),
    }
}

async fn echo(events: &mut broadcast::Receiver<Arc<DomainEvent>>, entity: &str) -> bool {
    loop {
        match events.recv().await {
            Ok(event) if event.as_value_update().is_some_and(|u| u.name == entity) => {
                return true
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}

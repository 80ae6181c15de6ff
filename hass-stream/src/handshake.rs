//! Handshake attempts: wait, open a fresh session, verify the server identity

use std::sync::Arc;
use std::time::Duration;

use rest_client::{check_response, RestError, RestRequest, RestSession, SessionOptions};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::connection::Signal;

/// What the server told us about itself during the handshake
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub uuid: String,
    pub version: Option<String>,
    /// Body of the root resource, absent when the server does not provide one
    pub root: Option<Value>,
}

/// Probe `uuid` and the optional root resource.
pub async fn verify(session: &RestSession) -> Result<ServerInfo, RestError> {
    let request = RestRequest::get("uuid").without_404_log();
    let response = check_response(&request, session.execute(&request).await?)?;
    if response.status >= 300 {
        return Err(RestError::NotReady {
            status: response.status,
            method: response.method,
            url: response.url,
        });
    }

    let uuid = response.text()?.trim().to_string();
    Uuid::parse_str(&uuid)
        .map_err(|e| RestError::Decode(format!("Invalid server uuid {uuid:?}: {e}")))?;

    let root = fetch_root(session).await?;
    let version = root
        .as_ref()
        .and_then(|root| root.get("version"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ServerInfo {
        uuid,
        version,
        root,
    })
}

async fn fetch_root(session: &RestSession) -> Result<Option<Value>, RestError> {
    let request = RestRequest::get("").without_404_log();
    let response = check_response(&request, session.execute(&request).await?)?;
    if response.status == 404 {
        return Ok(None);
    }

    match response.json::<Value>() {
        Ok(root) => Ok(Some(root)),
        Err(e) => {
            debug!("Ignoring undecodable server info: {}", e);
            Ok(None)
        }
    }
}

/// One handshake attempt. Every step is reported to the supervisor tagged
/// with `attempt` so results of cancelled attempts can be told apart.
pub(crate) async fn run_attempt(
    attempt: u64,
    delay: Duration,
    options: SessionOptions,
    signals: mpsc::UnboundedSender<Signal>,
) {
    if !delay.is_zero() {
        debug!("Next connection attempt in {:?}", delay);
        tokio::time::sleep(delay).await;
    }

    let _ = signals.send(Signal::Connecting { attempt });
    debug!("Trying to connect to {}:{} ...", options.host, options.port);

    let outcome = match RestSession::new(&options) {
        Ok(session) => {
            let session = Arc::new(session);
            let _ = signals.send(Signal::SessionOpened {
                attempt,
                session: session.clone(),
            });
            verify(&session).await
        }
        Err(e) => Err(e),
    };

    let _ = signals.send(Signal::HandshakeFinished { attempt, outcome });
}

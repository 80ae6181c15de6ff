//! Connection state owned by the supervisor and the snapshot it publishes

use std::sync::Arc;

use rest_client::RestSession;
use tokio::task::JoinHandle;

/// Progress of the handshake state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakePhase {
    /// Stopped, or waiting for the next attempt
    Idle,
    /// Opening a fresh session
    Connecting,
    /// Probing the server identity
    Verifying,
    /// Verified, the event stream is running
    Online,
}

/// Public view of the connection, published after every state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub phase: HandshakePhase,
    pub online: bool,
    pub read_only: bool,
    /// Incremented each time the connection goes online
    pub epoch: u64,
    /// A handshake attempt is scheduled or in flight
    pub reconnect_pending: bool,
    /// Identity reported by the server during the last handshake
    pub server_uuid: Option<String>,
}

impl ConnectionStatus {
    pub(crate) fn new(read_only: bool) -> Self {
        Self {
            phase: HandshakePhase::Idle,
            online: false,
            read_only,
            epoch: 0,
            reconnect_pending: false,
            server_uuid: None,
        }
    }
}

/// What request paths read from the supervisor: the status and the
/// current session.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub status: ConnectionStatus,
    pub session: Option<Arc<RestSession>>,
}

/// A spawned task together with the id that identifies its results.
#[derive(Debug)]
pub(crate) struct TrackedTask {
    pub id: u64,
    handle: JoinHandle<()>,
}

impl TrackedTask {
    pub fn new(id: u64, handle: JoinHandle<()>) -> Self {
        Self { id, handle }
    }

    /// Aborting an already finished task is a no-op.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Mutable connection state. Only the supervisor task touches this.
#[derive(Debug)]
pub(crate) struct ConnectionState {
    pub status: ConnectionStatus,
    pub session: Option<Arc<RestSession>>,
    pub stream_task: Option<TrackedTask>,
    pub handshake_task: Option<TrackedTask>,
}

impl ConnectionState {
    pub fn new(read_only: bool) -> Self {
        Self {
            status: ConnectionStatus::new(read_only),
            session: None,
            stream_task: None,
            handshake_task: None,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status.clone(),
            session: self.session.clone(),
        }
    }

    /// Whether a result tagged with `attempt` belongs to the current handshake
    pub fn is_current_attempt(&self, attempt: u64) -> bool {
        self.handshake_task
            .as_ref()
            .map(|task| task.id == attempt)
            .unwrap_or(false)
    }

    pub fn cancel_stream(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.cancel();
        }
    }

    pub fn cancel_handshake(&mut self) {
        if let Some(task) = self.handshake_task.take() {
            task.cancel();
        }
        self.status.reconnect_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_attempt_tracking() {
        let mut state = ConnectionState::new(false);
        assert!(!state.is_current_attempt(1));

        state.handshake_task = Some(TrackedTask::new(1, tokio::spawn(async {})));
        state.status.reconnect_pending = true;
        assert!(state.is_current_attempt(1));
        assert!(!state.is_current_attempt(2));

        state.cancel_handshake();
        assert!(!state.is_current_attempt(1));
        assert!(!state.status.reconnect_pending);
    }

    #[tokio::test]
    async fn test_cancel_stream_aborts_task() {
        let mut state = ConnectionState::new(false);
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        state.stream_task = Some(TrackedTask::new(3, handle));

        state.cancel_stream();
        state.cancel_stream();

        // The sender is dropped together with the aborted task
        assert!(alive_rx.await.is_err());
        assert!(state.stream_task.is_none());
    }

    #[test]
    fn test_initial_status() {
        let status = ConnectionState::new(true).snapshot().status;
        assert_eq!(status.phase, HandshakePhase::Idle);
        assert!(!status.online);
        assert!(status.read_only);
        assert_eq!(status.epoch, 0);
    }
}

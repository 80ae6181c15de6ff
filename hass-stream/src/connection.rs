//! Connection supervisor
//!
//! The supervisor is a single task that owns [`ConnectionState`] and the
//! [`BackoffTimer`]. Handshake attempts, the event stream and request paths
//! run as separate tasks and only report back through signals, so every
//! state transition happens in one place:
//!
//! ```text
//! Idle ──attempt──▶ Connecting ──session──▶ Verifying ──ok──▶ Online
//!   ▲                                           │                │
//!   └────────────── failure, backoff ◀──────────┘◀── disconnect ─┘
//! ```
//!
//! Results are tagged: handshake outcomes carry their attempt id, disconnect
//! signals carry the epoch of the online period they observed. Anything from
//! a cancelled attempt or an earlier online period is ignored.

use std::sync::Arc;

use rest_client::{RestError, RestSession};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::api::RestApi;
use crate::backoff::BackoffTimer;
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};
use crate::handshake::{self, ServerInfo};
use crate::listener::ConnectionListener;
use crate::state::{ConnectionState, ConnectionStatus, HandshakePhase, Snapshot, TrackedTask};
use crate::stream;
use crate::transport::Transport;

/// Reports from spawned tasks to the supervisor
#[derive(Debug)]
pub(crate) enum Signal {
    /// A request or the event stream found the session broken
    Disconnected { epoch: u64, reason: String },
    Connecting { attempt: u64 },
    SessionOpened {
        attempt: u64,
        session: Arc<RestSession>,
    },
    HandshakeFinished {
        attempt: u64,
        outcome: std::result::Result<ServerInfo, RestError>,
    },
}

#[derive(Debug)]
enum Command {
    Start(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
    SetReadOnly(bool),
}

pub struct ConnectionSupervisor {
    config: ConnectionConfig,
    listener: Arc<dyn ConnectionListener>,
    state: ConnectionState,
    backoff: BackoffTimer,
    snapshot_tx: watch::Sender<Snapshot>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    next_task_id: u64,
}

impl ConnectionSupervisor {
    /// Spawn the supervisor on the current tokio runtime.
    ///
    /// The connection stays idle until [`ConnectionHandle::start`]. The
    /// supervisor runs until every handle is dropped.
    pub fn spawn(
        config: ConnectionConfig,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<ConnectionHandle> {
        config.validate()?;

        let state = ConnectionState::new(config.listen_only);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let backoff = BackoffTimer::new(config.backoff_floor, config.backoff_ceiling);
        let transport = Transport::new(snapshot_rx, signal_tx.clone());

        let supervisor = Self {
            config,
            listener,
            state,
            backoff,
            snapshot_tx,
            signal_tx,
            next_task_id: 0,
        };
        tokio::spawn(supervisor.run(command_rx, signal_rx));

        Ok(ConnectionHandle {
            commands: command_tx,
            transport,
        })
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(signal) = signals.recv() => self.handle_signal(signal),
            }
        }

        self.stop().await;
        debug!("Connection supervisor stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::SetReadOnly(read_only) => {
                if self.state.status.read_only != read_only {
                    info!("Read only mode {}", if read_only { "enabled" } else { "disabled" });
                    self.state.status.read_only = read_only;
                    self.config.listen_only = read_only;
                    self.publish();
                }
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Disconnected { epoch, reason } => {
                if epoch != self.state.status.epoch {
                    debug!("Ignoring disconnect from earlier session: {}", reason);
                    return;
                }
                self.set_offline(&reason);
            }
            Signal::Connecting { attempt } => {
                if self.state.is_current_attempt(attempt) {
                    self.state.status.phase = HandshakePhase::Connecting;
                    self.publish();
                }
            }
            Signal::SessionOpened { attempt, session } => {
                if self.state.is_current_attempt(attempt) {
                    self.state.session = Some(session);
                    self.state.status.phase = HandshakePhase::Verifying;
                    self.publish();
                }
            }
            Signal::HandshakeFinished { attempt, outcome } => {
                if !self.state.is_current_attempt(attempt) {
                    debug!("Ignoring result of stale connection attempt {}", attempt);
                    return;
                }
                // Finished on its own, nothing to abort
                self.state.handshake_task = None;
                self.state.status.reconnect_pending = false;

                match outcome {
                    Ok(info) => self.go_online(info),
                    Err(e) => {
                        if e.is_disconnect_signal() {
                            warn!("... offline! {}", e);
                        } else {
                            error!("Connection attempt failed: {}", e);
                        }
                        self.state.status.phase = HandshakePhase::Idle;
                        self.schedule_handshake();
                    }
                }
            }
        }
    }

    async fn start(&mut self) -> Result<()> {
        debug!("Start connection");
        self.stop().await;

        if !self.config.is_enabled() {
            info!("No host configured, connection disabled");
            return Ok(());
        }

        let session = RestSession::new(&self.config.session_options())?;
        self.state.session = Some(Arc::new(session));
        self.backoff = BackoffTimer::new(self.config.backoff_floor, self.config.backoff_ceiling);
        self.schedule_handshake();
        Ok(())
    }

    /// Cancel all tasks and close the session. No reconnect is scheduled.
    async fn stop(&mut self) {
        self.state.cancel_handshake();
        self.state.cancel_stream();
        tokio::task::yield_now().await;

        if self.state.status.online {
            self.state.status.online = false;
            self.listener.on_disconnected();
        }
        self.state.status.phase = HandshakePhase::Idle;

        if self.state.session.take().is_some() {
            debug!("Session closed");
        }
        self.publish();
    }

    /// Replace any pending attempt with a new one after the next backoff interval.
    fn schedule_handshake(&mut self) {
        self.state.cancel_handshake();

        let attempt = self.next_id();
        let delay = self.backoff.next_interval();
        let handle = tokio::spawn(handshake::run_attempt(
            attempt,
            delay,
            self.config.session_options(),
            self.signal_tx.clone(),
        ));

        self.state.handshake_task = Some(TrackedTask::new(attempt, handle));
        self.state.status.reconnect_pending = true;
        self.publish();
    }

    fn go_online(&mut self, info: ServerInfo) {
        let Some(session) = self.state.session.clone() else {
            error!("Handshake finished without a session");
            self.schedule_handshake();
            return;
        };

        self.backoff.reset();

        if self.state.status.read_only {
            info!("Connected read only to instance {}", info.uuid);
        } else {
            info!("Connected to instance {}", info.uuid);
        }
        match &info.version {
            Some(version) => info!("Server version {}", version),
            None => debug!("Server did not report a version"),
        }

        let status = &mut self.state.status;
        status.online = true;
        status.phase = HandshakePhase::Online;
        status.epoch += 1;
        status.server_uuid = Some(info.uuid);

        self.publish();
        self.listener.on_connected();
        self.start_stream(session);
    }

    fn start_stream(&mut self, session: Arc<RestSession>) {
        self.state.cancel_stream();

        let id = self.next_id();
        let url = session.events_url(&self.config.topics());
        let handle = tokio::spawn(stream::run_stream(
            session,
            url,
            self.state.status.epoch,
            self.listener.clone(),
            self.signal_tx.clone(),
        ));
        self.state.stream_task = Some(TrackedTask::new(id, handle));
    }

    /// Idempotent: does nothing while already offline.
    fn set_offline(&mut self, reason: &str) {
        if !self.state.status.online {
            return;
        }

        warn!("Disconnected! {}", reason);
        self.state.status.online = false;
        self.state.status.phase = HandshakePhase::Idle;
        self.state.cancel_stream();
        self.listener.on_disconnected();
        self.schedule_handshake();
    }

    fn next_id(&mut self) -> u64 {
        self.next_task_id += 1;
        self.next_task_id
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}

/// Cloneable handle to a running supervisor
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    transport: Transport,
}

impl ConnectionHandle {
    /// (Re)start the connection: drop the current session and begin a
    /// handshake immediately.
    pub async fn start(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start(reply))?;
        rx.await.map_err(|_| ConnectionError::SupervisorGone)?
    }

    /// Cancel pending attempts and the event stream and close the session.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop(reply))?;
        rx.await.map_err(|_| ConnectionError::SupervisorGone)
    }

    /// Switch read-only mode at runtime
    pub fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.send(Command::SetReadOnly(read_only))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    pub fn is_online(&self) -> bool {
        self.status().online
    }

    pub fn is_read_only(&self) -> bool {
        self.status().read_only
    }

    /// Resolve once the connection is online.
    pub async fn wait_until_online(&self) -> Result<()> {
        self.wait_for(|status| status.online).await
    }

    /// Resolve once `predicate` holds for the published status.
    pub async fn wait_for(&self, predicate: impl Fn(&ConnectionStatus) -> bool) -> Result<()> {
        let mut snapshot = self.transport.watch();
        loop {
            if predicate(&snapshot.borrow_and_update().status) {
                return Ok(());
            }
            snapshot
                .changed()
                .await
                .map_err(|_| ConnectionError::SupervisorGone)?;
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn api(&self) -> RestApi {
        RestApi::new(self.transport.clone())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ConnectionError::SupervisorGone)
    }
}

//! Request path shared by every component that talks to the server
//!
//! A `Transport` reads the published connection snapshot, enforces
//! read-only and offline suppression of mutating calls, and reports every
//! failure classified as a disconnect signal back to the supervisor.

use std::sync::Arc;

use rest_client::{check_response, RestError, RestRequest, RestResponse, RestSession};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::connection::Signal;
use crate::error::Result;
use crate::state::{ConnectionStatus, Snapshot};

#[derive(Debug, Clone)]
pub struct Transport {
    snapshot: watch::Receiver<Snapshot>,
    signals: mpsc::UnboundedSender<Signal>,
}

impl Transport {
    pub(crate) fn new(
        snapshot: watch::Receiver<Snapshot>,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self { snapshot, signals }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.borrow().status.clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    fn current(&self) -> Result<(Arc<RestSession>, ConnectionStatus)> {
        let snapshot = self.snapshot.borrow();
        let session = snapshot.session.clone().ok_or(RestError::NotConfigured)?;
        Ok((session, snapshot.status.clone()))
    }

    /// Send a request.
    ///
    /// Mutating requests return `Ok(None)` without touching the network
    /// while read-only or offline. GET always executes.
    pub async fn request(&self, request: RestRequest) -> Result<Option<RestResponse>> {
        let (session, status) = self.current()?;

        if request.method.is_mutating() && (status.read_only || !status.online) {
            debug!(
                method = %request.method,
                path = %request.path,
                read_only = status.read_only,
                online = status.online,
                "Suppressed request"
            );
            return Ok(None);
        }

        self.execute(&session, status.epoch, &request).await.map(Some)
    }

    /// GET `path`, optionally without warning on 404.
    pub async fn get(&self, path: &str, log_404: bool) -> Result<RestResponse> {
        let (session, status) = self.current()?;
        let mut request = RestRequest::get(path);
        if !log_404 {
            request = request.without_404_log();
        }
        self.execute(&session, status.epoch, &request).await
    }

    /// GET `path` on a call that requires success: any status `>= 400`
    /// fails with [`RestError::UnexpectedFailure`] and counts as a disconnect.
    pub async fn get_required(&self, path: &str) -> Result<RestResponse> {
        let (session, status) = self.current()?;
        let request = RestRequest::get(path).disconnect_on_error();
        self.execute(&session, status.epoch, &request).await
    }

    async fn execute(
        &self,
        session: &RestSession,
        epoch: u64,
        request: &RestRequest,
    ) -> Result<RestResponse> {
        let outcome = match session.execute(request).await {
            Ok(response) => check_response(request, response),
            Err(e) => Err(e),
        };

        outcome.map_err(|e| {
            if e.is_disconnect_signal() {
                self.report_disconnect(epoch, &e);
            }
            e.into()
        })
    }

    fn report_disconnect(&self, epoch: u64, error: &RestError) {
        let signal = Signal::Disconnected {
            epoch,
            reason: error.to_string(),
        };
        if self.signals.send(signal).is_err() {
            debug!("Supervisor gone, dropping disconnect signal");
        }
    }
}

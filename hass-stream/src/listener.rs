//! Callbacks from the connection core into the application

use hass_events::RawFrame;

/// Receiver of connection lifecycle callbacks and push-event frames.
///
/// All callbacks run on the supervisor's event loop and must not block.
/// `on_connected` and `on_disconnected` strictly alternate, starting with
/// `on_connected`.
pub trait ConnectionListener: Send + Sync + 'static {
    /// The connection was verified and the event stream is being opened
    fn on_connected(&self) {}

    /// An online connection was found to be broken or was stopped
    fn on_disconnected(&self) {}

    /// A frame arrived on the event stream, in arrival order
    fn on_stream_event(&self, frame: RawFrame);
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ConnectionListener for NoopListener {
    fn on_stream_event(&self, _frame: RawFrame) {}
}

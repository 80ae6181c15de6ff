//! Push-event subscription

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use eventsource_stream::{EventStreamError, Eventsource};
use futures::{FutureExt, Stream, StreamExt};
use hass_events::RawFrame;
use rest_client::{classify, RestError, RestSession};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::connection::Signal;
use crate::listener::ConnectionListener;

/// Open the event subscription at `url`.
///
/// The returned stream yields frames until the server closes it or the
/// transport fails; a failure is yielded once as the last item. Frames whose
/// data is not a JSON frame object are skipped.
pub async fn subscribe(
    session: &RestSession,
    url: &str,
) -> Result<impl Stream<Item = Result<RawFrame, RestError>>, RestError> {
    let response = session.open_stream(url).await?;

    let frames = response
        .bytes_stream()
        .eventsource()
        .filter_map(|item| async move {
            match item {
                Ok(event) => match RawFrame::parse(&event.data) {
                    Ok(frame) => Some(Ok(frame)),
                    Err(e) => {
                        trace!("Skipping frame: {}", e);
                        None
                    }
                },
                Err(EventStreamError::Transport(e)) => Some(Err(classify(&e))),
                Err(e) => Some(Err(RestError::Request(e.to_string()))),
            }
        });

    Ok(frames)
}

/// Forward every frame to the listener until the stream ends.
///
/// A listener that panics loses only the frame it was handed.
pub(crate) async fn consume(
    session: &RestSession,
    url: &str,
    listener: &dyn ConnectionListener,
) -> Result<(), RestError> {
    let frames = subscribe(session, url).await?;
    let mut frames = std::pin::pin!(frames);
    debug!("Event stream opened");

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        debug!(
            target: "hass_stream::events",
            event_type = %frame.event_type,
            topic = %frame.topic,
            "{}",
            frame.payload
        );
        let topic = frame.topic.clone();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_stream_event(frame))) {
            error!(
                "Listener panicked handling event on {}, event dropped: {}",
                topic,
                panic_message(panic.as_ref())
            );
        }
    }

    Ok(())
}

/// Stream task of one online period. Cancellation drops it silently,
/// any other end, a panic included, is reported as a disconnect.
pub(crate) async fn run_stream(
    session: Arc<RestSession>,
    url: String,
    epoch: u64,
    listener: Arc<dyn ConnectionListener>,
    signals: mpsc::UnboundedSender<Signal>,
) {
    let consumed = AssertUnwindSafe(consume(&session, &url, listener.as_ref()))
        .catch_unwind()
        .await;
    let reason = disconnect_reason(consumed);

    drop(session);
    let _ = signals.send(Signal::Disconnected { epoch, reason });
}

fn disconnect_reason(consumed: std::thread::Result<Result<(), RestError>>) -> String {
    match consumed {
        Ok(Ok(())) => {
            warn!("Event stream closed by the server");
            "Event stream closed by the server".to_string()
        }
        Ok(Err(e)) if e.is_disconnect_signal() => {
            warn!("Event stream error: {}", e);
            e.to_string()
        }
        Ok(Err(e)) => {
            error!("Unexpected event stream error: {}", e);
            format!("Uncaught error in event stream: {e}")
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Event stream task panicked: {}", message);
            format!("Event stream task panicked: {message}")
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_end_is_a_disconnect() {
        let reason = disconnect_reason(Ok(Ok(())));
        assert_eq!(reason, "Event stream closed by the server");
    }

    #[test]
    fn test_unclassified_error_is_a_disconnect() {
        let reason = disconnect_reason(Ok(Err(RestError::Request("boom".to_string()))));
        assert!(reason.starts_with("Uncaught error in event stream"));
        assert!(reason.contains("boom"));
    }

    #[test]
    fn test_panic_is_a_disconnect() {
        let panicked = std::panic::catch_unwind(|| -> Result<(), RestError> {
            panic!("listener exploded")
        });
        let reason = disconnect_reason(panicked);
        assert_eq!(reason, "Event stream task panicked: listener exploded");

        let formatted: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(panic_message(formatted.as_ref()), "code 7");
        let opaque: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(opaque.as_ref()), "unknown panic");
    }
}

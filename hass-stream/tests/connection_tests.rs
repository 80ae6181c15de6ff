//! Integration tests for the connection supervisor.
//!
//! These tests run the supervisor against the warp mock server and verify:
//! - Handshake retries and the online transition
//! - Frame forwarding from the event stream
//! - Read-only and offline suppression of writes
//! - Reconnects after stream loss and server errors
//! - Shutdown without reconnects
//! - Listener panics and required requests
//! - Item definitions and metadata


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hass_events::{DefinitionError, GroupFunction, ItemDefinition, RawFrame};
use hass_stream::{
    ConnectionConfig, ConnectionError, ConnectionHandle, ConnectionListener, ConnectionSupervisor,
    HandshakePhase, RestError, RestRequest,
};
use serde_json::{json, Map};
use test_helpers::{
    item_state_frame, next_frame, unused_port, Callback, MockHassServer, RecordingListener,
    SERVER_UUID, TEST_TIMEOUT,
};
use tokio::sync::mpsc;

async fn wait_online(handle: &ConnectionHandle) {
    tokio::time::timeout(TEST_TIMEOUT, handle.wait_until_online())
        .await
        .expect("Timeout waiting for connection")
        .expect("Supervisor gone");
}

async fn wait_epoch(handle: &ConnectionHandle, epoch: u64) {
    tokio::time::timeout(
        TEST_TIMEOUT,
        handle.wait_for(|status| status.online && status.epoch == epoch),
    )
    .await
    .expect("Timeout waiting for reconnect")
    .expect("Supervisor gone");
}

#[tokio::test]
async fn test_not_ready_server_is_retried_until_online() {
    let server = MockHassServer::start().await;
    server.script_uuid_statuses(&[503]);

    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    let started = Instant::now();
    handle.start().await.unwrap();
    wait_online(&handle).await;

    // First attempt is immediate, the retry waits for the backoff floor
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(server.uuid_calls(), 2);
    assert_eq!(listener.connected(), 1);
    assert_eq!(listener.disconnected(), 0);

    let status = handle.status();
    assert_eq!(status.phase, HandshakePhase::Online);
    assert_eq!(status.epoch, 1);
    assert!(!status.reconnect_pending);
    assert_eq!(status.server_uuid.as_deref(), Some(SERVER_UUID));

    server.wait_for_stream(1).await;
    let topics = server.last_topics().unwrap();
    assert!(topics.contains("homeassistant/items/"));
    assert!(topics.contains("homeassistant/things/*/statuschanged"));
}

#[tokio::test]
async fn test_frames_are_forwarded_in_order() {
    let server = MockHassServer::start().await;
    let (listener, mut frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    server.wait_for_stream(1).await;

    assert!(server.push("this is not json"));
    assert!(server.push(&item_state_frame("First", "a")));
    assert!(server.push(r#"{"no": "frame"}"#));
    assert!(server.push(r#"{"type":"X","topic":"t","payload":"\"NONE\""}"#));
    assert!(server.push(&item_state_frame("Second", "b")));

    let first = next_frame(&mut frames).await;
    assert_eq!(first.topic, "homeassistant/items/First/state");

    let unknown = next_frame(&mut frames).await;
    assert_eq!(unknown.event_type, "X");
    assert_eq!(unknown.payload, "null");

    let second = next_frame(&mut frames).await;
    assert_eq!(second.topic, "homeassistant/items/Second/state");

    // Malformed frames never took the stream down
    assert!(handle.is_online());
    assert_eq!(server.stream_opens(), 1);
    assert_eq!(listener.disconnected(), 0);
}

#[tokio::test]
async fn test_read_only_suppresses_writes() {
    let server = MockHassServer::start().await;
    server.add_item("Light", "Switch");

    let (listener, _frames) = RecordingListener::new();
    let config = server.config().with_listen_only(true);
    let handle = ConnectionSupervisor::spawn(config, listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    assert!(handle.is_read_only());

    let api = handle.api();
    api.post_update("Light", "ON").await.unwrap();
    api.send_command("Light", "OFF").await.unwrap();
    assert!(!api.remove_item("Light").await.unwrap());

    // GET still goes out
    assert!(api.item_exists("Light").await.unwrap());
    let item = api.get_item("Light").await.unwrap().unwrap();
    assert_eq!(item.item_type, "Switch");

    assert!(server.writes().is_empty());
}

#[tokio::test]
async fn test_read_only_can_be_toggled_at_runtime() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    handle.set_read_only(true).unwrap();
    tokio::time::timeout(TEST_TIMEOUT, handle.wait_for(|status| status.read_only))
        .await
        .unwrap()
        .unwrap();
    handle.api().send_command("Light", "ON").await.unwrap();
    assert!(server.writes().is_empty());

    handle.set_read_only(false).unwrap();
    tokio::time::timeout(TEST_TIMEOUT, handle.wait_for(|status| !status.read_only))
        .await
        .unwrap()
        .unwrap();
    handle.api().send_command("Light", "ON").await.unwrap();

    let writes = server.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, "POST");
    assert_eq!(writes[0].path, "/rest/items/Light/");
    assert_eq!(writes[0].body, "ON");
}

#[tokio::test]
async fn test_requests_before_start_are_not_configured() {
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(ConnectionConfig::default(), listener).unwrap();

    let err = handle.api().send_command("Light", "ON").await.unwrap_err();
    assert_eq!(err, ConnectionError::Rest(RestError::NotConfigured));

    let err = handle.api().get_uuid().await.unwrap_err();
    assert_eq!(err, ConnectionError::Rest(RestError::NotConfigured));
}

#[tokio::test]
async fn test_empty_host_disables_connection() {
    let (listener, _frames) = RecordingListener::new();
    let config = ConnectionConfig::default().with_host("", 8123);
    let handle = ConnectionSupervisor::spawn(config, listener.clone()).unwrap();

    handle.start().await.unwrap();
    let status = handle.status();
    assert!(!status.online);
    assert!(!status.reconnect_pending);
    assert!(matches!(
        handle.api().get_uuid().await,
        Err(ConnectionError::Rest(RestError::NotConfigured))
    ));
    assert_eq!(listener.connected(), 0);
}

#[tokio::test]
async fn test_writes_are_dropped_while_offline() {
    let server = MockHassServer::start().await;
    server.script_uuid_statuses(&[503; 50]);
    server.add_item("Light", "Switch");

    let (listener, _frames) = RecordingListener::new();
    let config = server
        .config()
        .with_backoff(Duration::from_secs(5), Duration::from_secs(10));
    let handle = ConnectionSupervisor::spawn(config, listener).unwrap();

    handle.start().await.unwrap();
    tokio::time::timeout(TEST_TIMEOUT, async {
        while server.uuid_calls() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let api = handle.api();
    api.post_update("Light", "ON").await.unwrap();
    assert!(!api.create_item(&api.get_item("Light").await.unwrap().unwrap()).await.unwrap());

    assert!(!handle.is_online());
    assert!(handle.status().reconnect_pending);
    assert!(server.writes().is_empty());
}

#[tokio::test]
async fn test_stream_loss_reconnects() {
    let server = MockHassServer::start().await;
    let (listener, mut frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    server.wait_for_stream(1).await;

    server.close_stream();
    wait_epoch(&handle, 2).await;
    server.wait_for_stream(2).await;

    assert_eq!(listener.connected(), 2);
    assert_eq!(listener.disconnected(), 1);

    // The new stream delivers frames again
    assert!(server.push(&item_state_frame("Light", "ON")));
    let frame = next_frame(&mut frames).await;
    assert_eq!(frame.topic, "homeassistant/items/Light/state");
}

#[tokio::test]
async fn test_server_error_on_request_reconnects() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    let err = handle.api().get_item("Broken").await.unwrap_err();
    assert!(err.is_disconnect());
    assert!(matches!(
        err,
        ConnectionError::Rest(RestError::NotReady { status: 500, .. })
    ));

    wait_epoch(&handle, 2).await;
    assert_eq!(listener.connected(), 2);
    assert_eq!(listener.disconnected(), 1);
}

#[tokio::test]
async fn test_stop_cancels_without_reconnect() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    server.wait_for_stream(1).await;

    handle.stop().await.unwrap();
    let status = handle.status();
    assert!(!status.online);
    assert_eq!(status.phase, HandshakePhase::Idle);
    assert!(!status.reconnect_pending);
    assert_eq!(listener.disconnected(), 1);

    let uuid_calls = server.uuid_calls();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(server.uuid_calls(), uuid_calls);
    assert_eq!(listener.connected(), 1);

    // Already offline, no second callback
    handle.stop().await.unwrap();
    assert_eq!(listener.disconnected(), 1);

    assert!(matches!(
        handle.api().get_uuid().await,
        Err(ConnectionError::Rest(RestError::NotConfigured))
    ));
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    let (listener, _frames) = RecordingListener::new();
    let config = ConnectionConfig::default()
        .with_host("127.0.0.1", unused_port())
        .with_backoff(Duration::from_millis(20), Duration::from_millis(50));
    let handle = ConnectionSupervisor::spawn(config, listener.clone()).unwrap();

    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = handle.status();
    assert!(!status.online);
    assert!(status.reconnect_pending);
    assert_eq!(listener.connected(), 0);
    assert_eq!(listener.disconnected(), 0);

    handle.stop().await.unwrap();
    assert!(!handle.status().reconnect_pending);
}

#[tokio::test]
async fn test_restart_reconnects_once() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    handle.start().await.unwrap();
    wait_epoch(&handle, 2).await;

    assert_eq!(listener.connected(), 2);
    assert_eq!(listener.disconnected(), 1);
}

#[tokio::test]
async fn test_item_commands_reach_server() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    let api = handle.api();
    assert!(!api.item_exists("Heater").await.unwrap());
    assert!(api.get_item("Heater").await.unwrap().is_none());

    let item = ItemDefinition::new("Heater", "Number").with_label("Heater");
    assert!(api.create_item(&item).await.unwrap());
    assert!(api.item_exists("Heater").await.unwrap());

    api.post_update("Heater", "21.5").await.unwrap();
    assert!(api.remove_item("Heater").await.unwrap());
    assert!(!api.remove_item("Heater").await.unwrap());

    let writes = server.writes();
    let summary: Vec<(&str, &str)> = writes
        .iter()
        .map(|w| (w.method.as_str(), w.path.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("PUT", "/rest/items/Heater/"),
            ("PUT", "/rest/items/Heater/state/"),
            ("DELETE", "/rest/items/Heater/"),
            ("DELETE", "/rest/items/Heater/"),
        ]
    );

    assert!(matches!(
        api.send_command("bad/name", "ON").await,
        Err(ConnectionError::InvalidItemName(_))
    ));
    assert_eq!(api.get_uuid().await.unwrap(), SERVER_UUID);
    let root = api.get_root().await.unwrap().unwrap();
    assert_eq!(root["version"], "4.1.0");
}

/// Panics on the first frame it sees, forwards every later one
struct PanicOnceListener {
    panicked: AtomicBool,
    frames: mpsc::UnboundedSender<RawFrame>,
}

impl ConnectionListener for PanicOnceListener {
    fn on_stream_event(&self, frame: RawFrame) {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("listener failed on {}", frame.topic);
        }
        let _ = self.frames.send(frame);
    }
}

#[tokio::test]
async fn test_listener_panic_keeps_stream_running() {
    let server = MockHassServer::start().await;
    let (tx, mut frames) = mpsc::unbounded_channel();
    let listener = Arc::new(PanicOnceListener {
        panicked: AtomicBool::new(false),
        frames: tx,
    });
    let handle = ConnectionSupervisor::spawn(server.config(), listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    server.wait_for_stream(1).await;

    assert!(server.push(&item_state_frame("First", "a")));
    assert!(server.push(&item_state_frame("Second", "b")));

    let frame = next_frame(&mut frames).await;
    assert_eq!(frame.topic, "homeassistant/items/Second/state");

    let status = handle.status();
    assert!(status.online);
    assert_eq!(status.epoch, 1);
    assert_eq!(server.stream_opens(), 1);
}

#[tokio::test]
async fn test_required_request_failure_reconnects() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    let request = RestRequest::get("items/Missing").disconnect_on_error();
    let err = handle.transport().request(request).await.unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Rest(RestError::UnexpectedFailure { status: 404, .. })
    ));

    wait_epoch(&handle, 2).await;
    assert_eq!(listener.connected(), 2);
    assert_eq!(listener.disconnected(), 1);
}

#[tokio::test]
async fn test_plain_404_does_not_reconnect() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    assert!(handle.api().get_item("Missing").await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(handle.status().epoch, 1);
    assert_eq!(listener.disconnected(), 0);
}

#[tokio::test]
async fn test_start_while_retry_pending_connects_once() {
    let server = MockHassServer::start().await;
    server.script_uuid_statuses(&[503]);

    let (listener, _frames) = RecordingListener::new();
    let config = server
        .config()
        .with_backoff(Duration::from_secs(1), Duration::from_secs(5));
    let handle = ConnectionSupervisor::spawn(config, listener.clone()).unwrap();

    handle.start().await.unwrap();
    tokio::time::timeout(TEST_TIMEOUT, async {
        while server.uuid_calls() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.status().reconnect_pending);
    assert!(!handle.is_online());

    // A fresh start skips the pending backoff
    let restarted = Instant::now();
    handle.start().await.unwrap();
    wait_online(&handle).await;
    assert!(restarted.elapsed() < Duration::from_millis(900));

    // The cancelled retry never fires
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(server.uuid_calls(), 2);
    assert_eq!(listener.connected(), 1);
    assert_eq!(listener.disconnected(), 0);
    assert_eq!(handle.status().epoch, 1);
}

#[tokio::test]
async fn test_connected_callback_precedes_frames() {
    let server = MockHassServer::start().await;
    let (listener, mut frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener.clone()).unwrap();

    handle.start().await.unwrap();
    server.wait_for_stream(1).await;
    assert!(server.push(&item_state_frame("Light", "ON")));
    next_frame(&mut frames).await;

    server.close_stream();
    wait_epoch(&handle, 2).await;
    server.wait_for_stream(2).await;
    assert!(server.push(&item_state_frame("Light", "OFF")));
    next_frame(&mut frames).await;

    assert_eq!(
        listener.callbacks(),
        vec![
            Callback::Connected,
            Callback::Frame,
            Callback::Disconnected,
            Callback::Connected,
            Callback::Frame,
        ]
    );
}

#[tokio::test]
async fn test_invalid_definitions_are_not_sent() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    let api = handle.api();

    let err = api
        .create_item(&ItemDefinition::new("Outside", "Number:Warmth"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConnectionError::InvalidItemDefinition(DefinitionError::UnknownDimension(
            "Warmth".to_string()
        ))
    );

    let not_a_group = ItemDefinition::new("Lights", "Switch")
        .with_group_function(GroupFunction::new("OR", ["ON", "OFF"]));
    assert!(matches!(
        api.create_item(&not_a_group).await,
        Err(ConnectionError::InvalidItemDefinition(DefinitionError::NotAGroup(_)))
    ));
    assert!(server.writes().is_empty());

    let group = ItemDefinition::new("Lights", "Group")
        .with_group_type("Switch")
        .with_group_function(GroupFunction::new("OR", ["ON", "OFF"]));
    assert!(api.create_item(&group).await.unwrap());

    let writes = server.writes();
    assert_eq!(writes.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&writes[0].body).unwrap();
    assert_eq!(body["groupType"], "Switch");
    assert_eq!(body["function"]["name"], "OR");
    assert_eq!(body["function"]["params"], json!(["ON", "OFF"]));
}

#[tokio::test]
async fn test_item_metadata_is_set_and_removed() {
    let server = MockHassServer::start().await;
    server.add_item("Heater", "Number");
    let (listener, _frames) = RecordingListener::new();
    let handle = ConnectionSupervisor::spawn(server.config(), listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;
    let api = handle.api();

    let mut config = Map::new();
    config.insert("room".to_string(), json!("kitchen"));
    assert!(api
        .set_metadata("Heater", "homekit", "Thermostat", config)
        .await
        .unwrap());
    assert_eq!(
        server.metadata("Heater", "homekit"),
        Some(json!({"value": "Thermostat", "config": {"room": "kitchen"}}))
    );

    assert!(api.remove_metadata("Heater", "homekit").await.unwrap());
    assert!(!api.remove_metadata("Heater", "homekit").await.unwrap());
    assert_eq!(server.metadata("Heater", "homekit"), None);

    assert!(matches!(
        api.remove_metadata("Heater", "home/kit").await,
        Err(ConnectionError::InvalidNamespace(_))
    ));

    let paths: Vec<(String, String)> = server
        .writes()
        .into_iter()
        .map(|w| (w.method, w.path))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("PUT".to_string(), "/rest/items/Heater/metadata/homekit/".to_string()),
            ("DELETE".to_string(), "/rest/items/Heater/metadata/homekit/".to_string()),
            ("DELETE".to_string(), "/rest/items/Heater/metadata/homekit/".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_metadata_is_suppressed_when_read_only() {
    let server = MockHassServer::start().await;
    let (listener, _frames) = RecordingListener::new();
    let config = server.config().with_listen_only(true);
    let handle = ConnectionSupervisor::spawn(config, listener).unwrap();

    handle.start().await.unwrap();
    wait_online(&handle).await;

    let api = handle.api();
    assert!(!api.set_metadata("Heater", "homekit", "Thermostat", Map::new()).await.unwrap());
    assert!(!api.remove_metadata("Heater", "homekit").await.unwrap());
    assert!(server.writes().is_empty());
}

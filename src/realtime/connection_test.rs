use super::*;
use crate::auth::MemoryTokenStore;
use crate::envelope::MessageKind;
use crate::realtime::test_helpers::{self, TEST_WS_URL, connected, envelope, memory_connection};
use crate::transport::memory::{ConnectRequest, MemoryTransport};
use serde_json::json;
use std::sync::Mutex;

#[tokio::test]
async fn init_connects_exactly_once() {
    let (transport, connection) = memory_connection();

    assert!(connection.init().await.expect("first init"));
    assert!(!connection.init().await.expect("second init"));
    let clone = connection.clone();
    assert!(!clone.init().await.expect("init from clone"));

    assert_eq!(transport.connects().len(), 1);
    assert_eq!(connection.status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn init_passes_url_and_stored_token() {
    let transport = Arc::new(MemoryTransport::new());
    let connection = Connection::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(MemoryTokenStore::new(Some("jwt-1".into()))),
        test_helpers::test_config(None),
    );

    connection.init().await.expect("init");
    assert_eq!(
        transport.connects(),
        vec![ConnectRequest { url: TEST_WS_URL.into(), token: Some("jwt-1".into()) }]
    );
}

#[tokio::test]
async fn failed_init_reports_error_and_stays_disconnected() {
    let (transport, connection) = memory_connection();
    transport.fail_connects("server down");

    let err = connection.init().await.expect_err("init should fail");
    assert!(matches!(err, TransportError::ConnectFailed(_)));
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);

    // No retry from this layer.
    assert!(!connection.init().await.expect("flag already set"));
    assert_eq!(transport.connects().len(), 1);
}

#[tokio::test]
async fn status_mirrors_transport_changes() {
    let (transport, connection) = memory_connection();
    let mut status = connection.watch_status();
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);

    transport.set_status(ConnectionStatus::Connecting);
    status.changed().await.expect("status change");
    assert_eq!(*status.borrow(), ConnectionStatus::Connecting);
    assert_eq!(connection.status(), ConnectionStatus::Connecting);

    transport.set_status(ConnectionStatus::Connected);
    assert!(connection.is_connected());
}

#[test]
fn send_completes_envelope_with_default_user() {
    let (transport, connection) = connected();

    assert!(connection.send(OutboundMessage::new(MessageKind::LeadCreated, json!({ "id": "l1" }))));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::LeadCreated);
    assert_eq!(sent[0].user_id, "me");
    assert!(!sent[0].timestamp.is_empty());
}

#[test]
fn send_returns_false_when_disconnected() {
    let (transport, connection) = memory_connection();
    assert!(!connection.send(OutboundMessage::new(MessageKind::LeadCreated, json!({}))));
    assert!(transport.sent().is_empty());
}

#[test]
fn dropping_a_clone_does_not_disconnect() {
    let (transport, connection) = connected();
    let clone = connection.clone();
    drop(clone);
    drop(connection);

    assert_eq!(transport.disconnects(), 0);
    assert_eq!(transport.status(), ConnectionStatus::Connected);
}

#[test]
fn disconnect_tears_down_transport() {
    let (transport, connection) = connected();
    connection.disconnect();
    assert_eq!(transport.disconnects(), 1);
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn close_tears_down_transport() {
    let (transport, connection) = connected();
    connection.close().await;
    assert_eq!(transport.disconnects(), 1);
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
}

#[test]
fn subscribe_registers_one_listener_and_delivers_payload() {
    let (transport, connection) = connected();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let _subscription = connection.subscribe(MessageKind::LeadUpdated, move |payload: &Value, env: &Envelope| {
        sink.lock().unwrap().push((payload.clone(), env.user_id.clone()));
    });
    assert_eq!(transport.listener_count(), 1);

    transport.emit(&envelope(MessageKind::LeadUpdated, json!({ "id": "l2" }), "u5"));
    assert_eq!(*seen.lock().unwrap(), vec![(json!({ "id": "l2" }), "u5".to_owned())]);
}

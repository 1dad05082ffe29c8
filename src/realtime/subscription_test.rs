use super::*;
use crate::realtime::test_helpers::{connected, envelope};
use serde_json::json;
use std::sync::Mutex;

fn recorder() -> (Arc<Mutex<Vec<MessageKind>>>, impl Fn(&Value, &Envelope) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |_: &Value, env: &Envelope| sink.lock().unwrap().push(env.kind))
}

#[test]
fn handler_ignores_other_kinds() {
    let (transport, connection) = connected();
    let (seen, handler) = recorder();
    let _sub = connection.subscribe(MessageKind::LeadCreated, handler);

    transport.emit(&envelope(MessageKind::LeadUpdated, json!({ "id": "l1" }), "u1"));
    assert!(seen.lock().unwrap().is_empty());

    transport.emit(&envelope(MessageKind::LeadCreated, json!({ "id": "l1" }), "u1"));
    assert_eq!(*seen.lock().unwrap(), vec![MessageKind::LeadCreated]);
}

#[test]
fn multi_kind_filter_delivers_in_emission_order() {
    let (transport, connection) = connected();
    let (seen, handler) = recorder();
    let _sub = connection.subscribe([MessageKind::CallStarted, MessageKind::CallEnded], handler);

    transport.emit(&envelope(MessageKind::CallEnded, json!({}), "u1"));
    transport.emit(&envelope(MessageKind::UserJoined, json!({}), "u1"));
    transport.emit(&envelope(MessageKind::CallStarted, json!({}), "u1"));

    assert_eq!(*seen.lock().unwrap(), vec![MessageKind::CallEnded, MessageKind::CallStarted]);
}

#[test]
fn subscribers_to_the_same_kind_each_receive_every_message() {
    let (transport, connection) = connected();
    let (seen_a, handler_a) = recorder();
    let (seen_b, handler_b) = recorder();
    let _a = connection.subscribe(MessageKind::Notification, handler_a);
    let _b = connection.subscribe(MessageKind::Notification, handler_b);

    transport.emit(&envelope(MessageKind::Notification, json!({}), "u1"));
    transport.emit(&envelope(MessageKind::Notification, json!({}), "u1"));

    assert_eq!(seen_a.lock().unwrap().len(), 2);
    assert_eq!(seen_b.lock().unwrap().len(), 2);
}

#[test]
fn set_handler_swaps_without_reregistering() {
    let (transport, connection) = connected();
    let (first, handler) = recorder();
    let sub = connection.subscribe(MessageKind::UserLeft, handler);
    transport.emit(&envelope(MessageKind::UserLeft, json!({}), "u1"));

    let (second, replacement) = recorder();
    sub.set_handler(replacement);
    transport.emit(&envelope(MessageKind::UserLeft, json!({}), "u1"));

    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap().len(), 1);
    assert_eq!(transport.listener_count(), 1);
}

#[test]
fn resubscribe_with_same_kinds_keeps_listener() {
    let (transport, connection) = connected();
    let (_, handler) = recorder();
    let mut sub = connection.subscribe([MessageKind::LeadCreated, MessageKind::LeadUpdated], handler);

    sub.resubscribe(vec![MessageKind::LeadUpdated, MessageKind::LeadCreated, MessageKind::LeadCreated]);
    assert_eq!(transport.listener_count(), 1);
    assert_eq!(sub.kinds(), &[MessageKind::LeadCreated, MessageKind::LeadUpdated]);
}

#[test]
fn resubscribe_changes_filter() {
    let (transport, connection) = connected();
    let (seen, handler) = recorder();
    let mut sub = connection.subscribe(MessageKind::LeadCreated, handler);

    sub.resubscribe(MessageKind::LeadDeleted);
    transport.emit(&envelope(MessageKind::LeadCreated, json!({}), "u1"));
    transport.emit(&envelope(MessageKind::LeadDeleted, json!({}), "u1"));

    assert_eq!(*seen.lock().unwrap(), vec![MessageKind::LeadDeleted]);
    assert_eq!(transport.listener_count(), 1);
}

#[test]
fn dropping_subscription_unregisters_listener() {
    let (transport, connection) = connected();
    let (seen, handler) = recorder();
    let sub = connection.subscribe(MessageKind::Notification, handler);
    drop(sub);

    transport.emit(&envelope(MessageKind::Notification, json!({}), "u1"));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(transport.listener_count(), 0);
    assert_eq!(transport.disconnects(), 0);
}

#[test]
fn kind_filter_dedups_and_matches() {
    let filter = KindFilter::from(&[MessageKind::UserLeft, MessageKind::UserJoined, MessageKind::UserLeft][..]);
    assert_eq!(filter.kinds(), &[MessageKind::UserJoined, MessageKind::UserLeft]);
    assert!(filter.matches(MessageKind::UserJoined));
    assert!(!filter.matches(MessageKind::Notification));
}

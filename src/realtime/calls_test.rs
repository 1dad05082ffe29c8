use super::*;
use crate::realtime::test_helpers::{connected, envelope, memory_connection};
use std::sync::Mutex;

fn collect<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |item: &T| sink.lock().unwrap().push(item.clone()))
}

#[test]
fn call_lifecycle_tracks_active_calls() {
    let (transport, connection) = connected();
    let (events, handler) = collect::<CallEvent>();
    let calls = CallUpdates::attach(&connection, handler);

    transport.emit(&envelope(MessageKind::CallStarted, json!({ "callId": "c1", "leadId": "l1" }), "u1"));
    transport.emit(&envelope(MessageKind::CallStarted, json!({ "id": "c2" }), "u2"));
    assert_eq!(calls.active_calls(), BTreeSet::from(["c1".to_owned(), "c2".to_owned()]));

    transport.emit(&envelope(MessageKind::CallUpdated, json!({ "callId": "c1", "status": "on_hold" }), "u1"));
    transport.emit(&envelope(MessageKind::CallEnded, json!({ "callId": "c1", "duration": 42 }), "u1"));

    assert!(!calls.is_active("c1"));
    assert!(calls.is_active("c2"));

    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![CallEventKind::Started, CallEventKind::Started, CallEventKind::Updated, CallEventKind::Ended]
    );
    let ended = events.lock().unwrap()[3].clone();
    assert_eq!(ended.call.duration, Some(42));
    assert_eq!(ended.user_id, "u1");
}

#[test]
fn non_object_call_payload_is_dropped() {
    let (transport, connection) = connected();
    let (events, handler) = collect::<CallEvent>();
    let calls = CallUpdates::attach(&connection, handler);

    transport.emit(&envelope(MessageKind::CallStarted, json!([1, 2, 3]), "u1"));

    assert!(events.lock().unwrap().is_empty());
    assert!(calls.active_calls().is_empty());
}

#[test]
fn call_event_rejects_other_kinds() {
    let env = envelope(MessageKind::LeadCreated, json!({ "id": "l1" }), "u1");
    assert!(CallEvent::from_envelope(&env).is_none());
}

#[test]
fn signals_for_local_user_are_delivered() {
    let (transport, connection) = connected();
    let (signals, handler) = collect::<Signal>();
    let _signaling = CallSignaling::attach(&connection, "me", handler);

    transport.emit(&envelope(
        MessageKind::WebrtcOffer,
        json!({ "callId": "c1", "targetUserId": "me", "sdp": "v=0" }),
        "peer",
    ));
    transport.emit(&envelope(MessageKind::WebrtcIceCandidate, json!({ "callId": "c1", "candidate": { "x": 1 } }), "peer"));

    let signals = signals.lock().unwrap();
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].kind, SignalKind::Offer);
    assert_eq!(signals[0].from_user_id, "peer");
    assert_eq!(signals[0].payload.sdp.as_deref(), Some("v=0"));
    assert_eq!(signals[1].kind, SignalKind::IceCandidate);
    assert_eq!(signals[1].payload.candidate, Some(json!({ "x": 1 })));
}

#[test]
fn signals_for_other_users_and_own_echoes_are_ignored() {
    let (transport, connection) = connected();
    let (signals, handler) = collect::<Signal>();
    let _signaling = CallSignaling::attach(&connection, "me", handler);

    transport.emit(&envelope(MessageKind::WebrtcAnswer, json!({ "targetUserId": "someone-else", "sdp": "v=0" }), "peer"));
    transport.emit(&envelope(MessageKind::WebrtcOffer, json!({ "targetUserId": "peer", "sdp": "v=0" }), "me"));

    assert!(signals.lock().unwrap().is_empty());
}

#[test]
fn outbound_signals_follow_broadcast_rules() {
    let (transport, connection) = connected();
    let signaling = CallSignaling::attach(&connection, "me", |_: &Signal| {});

    assert!(signaling.send_offer("c1", "peer", "v=0"));
    assert!(signaling.send_ice_candidate("c1", "peer", json!({ "candidate": "a" })));

    let sent = transport.sent();
    assert_eq!(sent[0].kind, MessageKind::WebrtcOffer);
    assert_eq!(sent[0].user_id, "me");
    assert_eq!(sent[0].payload, json!({ "callId": "c1", "targetUserId": "peer", "sdp": "v=0" }));
    assert_eq!(sent[1].kind, MessageKind::WebrtcIceCandidate);
}

#[test]
fn outbound_signal_dropped_while_disconnected() {
    let (transport, connection) = memory_connection();
    let signaling = CallSignaling::attach(&connection, "me", |_: &Signal| {});

    assert!(!signaling.send_answer("c1", "peer", "v=0"));
    assert_eq!(transport.send_attempts(), 0);
}

#[test]
fn signal_kind_maps_to_wire_kind() {
    assert_eq!(SignalKind::Offer.message_kind(), MessageKind::WebrtcOffer);
    assert_eq!(SignalKind::Answer.message_kind(), MessageKind::WebrtcAnswer);
    assert_eq!(SignalKind::IceCandidate.message_kind(), MessageKind::WebrtcIceCandidate);
    assert_eq!(SignalKind::from_message_kind(MessageKind::UserLeft), None);
}

//! Call lifecycle updates and WebRTC signaling relay.
//!
//! Only the signaling messages are modelled here. Producing SDP and ICE
//! candidates is the media stack's job; this module moves them between
//! peers over the shared channel.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::watch;

use super::broadcast::Broadcaster;
use super::connection::Connection;
use super::subscription::Subscription;
use crate::envelope::{CallPayload, Envelope, MessageKind, SignalPayload};

// =============================================================================
// CALL UPDATES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallEventKind {
    Started,
    Ended,
    Updated,
}

/// A typed `call_*` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallEvent {
    pub kind: CallEventKind,
    pub call: CallPayload,
    pub user_id: String,
    pub timestamp: String,
}

impl CallEvent {
    /// `None` for non-call kinds or payloads that are not call objects.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let kind = match envelope.kind {
            MessageKind::CallStarted => CallEventKind::Started,
            MessageKind::CallEnded => CallEventKind::Ended,
            MessageKind::CallUpdated => CallEventKind::Updated,
            MessageKind::LeadCreated
            | MessageKind::LeadUpdated
            | MessageKind::LeadDeleted
            | MessageKind::UserJoined
            | MessageKind::UserLeft
            | MessageKind::Notification
            | MessageKind::WebrtcOffer
            | MessageKind::WebrtcAnswer
            | MessageKind::WebrtcIceCandidate => return None,
        };
        let call = envelope.payload_as::<CallPayload>().ok()?;
        Some(Self { kind, call, user_id: envelope.user_id.clone(), timestamp: envelope.timestamp.clone() })
    }
}

/// Forwards call lifecycle events and tracks which calls are in progress.
pub struct CallUpdates {
    active: Arc<watch::Sender<BTreeSet<String>>>,
    _subscription: Subscription,
}

impl CallUpdates {
    pub fn attach<F>(connection: &Connection, handler: F) -> Self
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        let (active, _) = watch::channel(BTreeSet::new());
        let active = Arc::new(active);
        let state = Arc::clone(&active);
        let subscription = connection.subscribe(
            [MessageKind::CallStarted, MessageKind::CallEnded, MessageKind::CallUpdated],
            move |_, envelope| {
                let Some(event) = CallEvent::from_envelope(envelope) else {
                    tracing::warn!(kind = %envelope.kind, "malformed call payload dropped");
                    return;
                };
                if !event.call.call_id.is_empty() {
                    let id = event.call.call_id.clone();
                    match event.kind {
                        CallEventKind::Started => {
                            state.send_if_modified(|set| set.insert(id));
                        }
                        CallEventKind::Ended => {
                            state.send_if_modified(|set| set.remove(&id));
                        }
                        CallEventKind::Updated => {}
                    }
                }
                handler(&event);
            },
        );
        Self { active, _subscription: subscription }
    }

    #[must_use]
    pub fn active_calls(&self) -> BTreeSet<String> {
        self.active.borrow().clone()
    }

    #[must_use]
    pub fn is_active(&self, call_id: &str) -> bool {
        self.active.borrow().contains(call_id)
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<BTreeSet<String>> {
        self.active.subscribe()
    }
}

// =============================================================================
// SIGNALING
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    #[must_use]
    pub fn message_kind(self) -> MessageKind {
        match self {
            Self::Offer => MessageKind::WebrtcOffer,
            Self::Answer => MessageKind::WebrtcAnswer,
            Self::IceCandidate => MessageKind::WebrtcIceCandidate,
        }
    }

    fn from_message_kind(kind: MessageKind) -> Option<Self> {
        match kind {
            MessageKind::WebrtcOffer => Some(Self::Offer),
            MessageKind::WebrtcAnswer => Some(Self::Answer),
            MessageKind::WebrtcIceCandidate => Some(Self::IceCandidate),
            MessageKind::CallStarted
            | MessageKind::CallEnded
            | MessageKind::CallUpdated
            | MessageKind::LeadCreated
            | MessageKind::LeadUpdated
            | MessageKind::LeadDeleted
            | MessageKind::UserJoined
            | MessageKind::UserLeft
            | MessageKind::Notification => None,
        }
    }
}

/// An inbound signaling message addressed to this client.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub from_user_id: String,
    pub payload: SignalPayload,
}

pub struct CallSignaling {
    broadcaster: Broadcaster,
    _subscription: Subscription,
}

impl CallSignaling {
    pub fn attach<F>(connection: &Connection, local_user_id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let local_user_id = local_user_id.into();
        let broadcaster = Broadcaster::new(connection, local_user_id.clone());
        let subscription = connection.subscribe(
            [MessageKind::WebrtcOffer, MessageKind::WebrtcAnswer, MessageKind::WebrtcIceCandidate],
            move |_, envelope| {
                if let Some(signal) = accept_signal(envelope, &local_user_id) {
                    handler(&signal);
                }
            },
        );
        Self { broadcaster, _subscription: subscription }
    }

    pub fn send_offer(&self, call_id: &str, target_user_id: &str, sdp: &str) -> bool {
        self.send(SignalKind::Offer, json!({ "callId": call_id, "targetUserId": target_user_id, "sdp": sdp }))
    }

    pub fn send_answer(&self, call_id: &str, target_user_id: &str, sdp: &str) -> bool {
        self.send(SignalKind::Answer, json!({ "callId": call_id, "targetUserId": target_user_id, "sdp": sdp }))
    }

    pub fn send_ice_candidate(&self, call_id: &str, target_user_id: &str, candidate: Value) -> bool {
        self.send(
            SignalKind::IceCandidate,
            json!({ "callId": call_id, "targetUserId": target_user_id, "candidate": candidate }),
        )
    }

    fn send(&self, kind: SignalKind, payload: Value) -> bool {
        self.broadcaster.broadcast(kind.message_kind(), payload)
    }
}

/// Drops our own echoes and signals targeted at someone else.
fn accept_signal(envelope: &Envelope, local_user_id: &str) -> Option<Signal> {
    let kind = SignalKind::from_message_kind(envelope.kind)?;
    if envelope.user_id == local_user_id {
        return None;
    }
    let payload = match envelope.payload_as::<SignalPayload>() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, kind = %envelope.kind, "malformed signaling payload dropped");
            return None;
        }
    };
    if payload.target_user_id.as_deref().is_some_and(|target| target != local_user_id) {
        return None;
    }
    Some(Signal { kind, from_user_id: envelope.user_id.clone(), payload })
}

#[cfg(test)]
#[path = "calls_test.rs"]
mod tests;

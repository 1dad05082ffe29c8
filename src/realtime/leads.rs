//! Lead change feed.

use super::connection::Connection;
use super::subscription::Subscription;
use crate::envelope::{Envelope, LeadPayload, MessageKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeadEventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadEvent {
    pub kind: LeadEventKind,
    pub lead: LeadPayload,
    pub user_id: String,
    pub timestamp: String,
}

impl LeadEvent {
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let kind = match envelope.kind {
            MessageKind::LeadCreated => LeadEventKind::Created,
            MessageKind::LeadUpdated => LeadEventKind::Updated,
            MessageKind::LeadDeleted => LeadEventKind::Deleted,
            MessageKind::CallStarted
            | MessageKind::CallEnded
            | MessageKind::CallUpdated
            | MessageKind::UserJoined
            | MessageKind::UserLeft
            | MessageKind::Notification
            | MessageKind::WebrtcOffer
            | MessageKind::WebrtcAnswer
            | MessageKind::WebrtcIceCandidate => return None,
        };
        let lead = envelope.payload_as::<LeadPayload>().ok()?;
        Some(Self { kind, lead, user_id: envelope.user_id.clone(), timestamp: envelope.timestamp.clone() })
    }
}

/// Forwards `lead_*` messages as typed events. Holds no state of its own.
pub struct LeadUpdates {
    _subscription: Subscription,
}

impl LeadUpdates {
    pub fn attach<F>(connection: &Connection, handler: F) -> Self
    where
        F: Fn(&LeadEvent) + Send + Sync + 'static,
    {
        let subscription = connection.subscribe(
            [MessageKind::LeadCreated, MessageKind::LeadUpdated, MessageKind::LeadDeleted],
            move |_, envelope| match LeadEvent::from_envelope(envelope) {
                Some(event) => handler(&event),
                None => tracing::warn!(kind = %envelope.kind, "malformed lead payload dropped"),
            },
        );
        Self { _subscription: subscription }
    }
}

#[cfg(test)]
#[path = "leads_test.rs"]
mod tests;

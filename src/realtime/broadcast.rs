//! Fire-and-drop outbound messages.

use serde_json::{Value, json};

use super::connection::Connection;
use crate::envelope::{MessageKind, OutboundMessage};

/// Sends envelopes stamped with a fixed sender id.
///
/// Nothing is queued: while the connection is not `Connected` every call
/// returns `false` and the transport is never touched.
#[derive(Clone)]
pub struct Broadcaster {
    connection: Connection,
    user_id: String,
}

impl Broadcaster {
    pub fn new(connection: &Connection, user_id: impl Into<String>) -> Self {
        Self { connection: connection.clone(), user_id: user_id.into() }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn broadcast(&self, kind: MessageKind, payload: Value) -> bool {
        if !self.connection.is_connected() {
            tracing::debug!(%kind, status = %self.connection.status(), "broadcast skipped while not connected");
            return false;
        }
        self.connection.send(OutboundMessage::new(kind, payload).with_user_id(self.user_id.clone()))
    }

    pub fn call_started(&self, call_id: &str, lead_id: &str) -> bool {
        self.broadcast(MessageKind::CallStarted, json!({ "callId": call_id, "leadId": lead_id }))
    }

    pub fn call_ended(&self, call_id: &str, outcome: &str, duration_secs: u64) -> bool {
        self.broadcast(
            MessageKind::CallEnded,
            json!({ "callId": call_id, "outcome": outcome, "duration": duration_secs }),
        )
    }

    pub fn lead_created(&self, lead: Value) -> bool {
        self.broadcast(MessageKind::LeadCreated, lead)
    }

    pub fn lead_updated(&self, lead: Value) -> bool {
        self.broadcast(MessageKind::LeadUpdated, lead)
    }

    pub fn notify(&self, title: &str, message: &str) -> bool {
        self.broadcast(MessageKind::Notification, json!({ "title": title, "message": message }))
    }
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;

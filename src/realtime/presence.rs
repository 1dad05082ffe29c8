//! Online-user tracking from join/leave events.
//!
//! Presence is purely event driven: there is no snapshot request on
//! connect and no expiry, so a client only knows about users whose join it
//! has seen, and a dropped `user_left` leaves a stale entry.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use super::connection::Connection;
use super::subscription::Subscription;
use crate::envelope::{Envelope, MessageKind};

pub struct Presence {
    users: Arc<watch::Sender<BTreeSet<String>>>,
    _subscription: Subscription,
}

impl Presence {
    #[must_use]
    pub fn attach(connection: &Connection) -> Self {
        let (users, _) = watch::channel(BTreeSet::new());
        let users = Arc::new(users);
        let state = Arc::clone(&users);
        let subscription = connection.subscribe([MessageKind::UserJoined, MessageKind::UserLeft], move |_, envelope| {
            apply(&state, envelope);
        });
        Self { users, _subscription: subscription }
    }

    /// Snapshot of the online user ids.
    #[must_use]
    pub fn online_users(&self) -> BTreeSet<String> {
        self.users.borrow().clone()
    }

    #[must_use]
    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.borrow().contains(user_id)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.users.borrow().len()
    }

    /// Observe changes. Duplicate joins and unknown leaves do not notify.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<BTreeSet<String>> {
        self.users.subscribe()
    }
}

/// A non-empty payload `userId` wins; the envelope sender is the fallback.
/// A `userId` that is present but not a string drops the event.
fn presence_user_id(envelope: &Envelope) -> Option<String> {
    let non_empty = |id: &str| Some(id.to_owned()).filter(|id| !id.is_empty());
    match envelope.payload.get("userId") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::String(_) | Value::Null) | None => non_empty(&envelope.user_id),
        Some(_) => None,
    }
}

fn apply(users: &watch::Sender<BTreeSet<String>>, envelope: &Envelope) {
    let Some(user_id) = presence_user_id(envelope) else {
        tracing::debug!(kind = %envelope.kind, "presence event without user id");
        return;
    };

    match envelope.kind {
        MessageKind::UserJoined => {
            users.send_if_modified(|set| set.insert(user_id));
        }
        MessageKind::UserLeft => {
            users.send_if_modified(|set| set.remove(&user_id));
        }
        MessageKind::CallStarted
        | MessageKind::CallEnded
        | MessageKind::CallUpdated
        | MessageKind::LeadCreated
        | MessageKind::LeadUpdated
        | MessageKind::LeadDeleted
        | MessageKind::Notification
        | MessageKind::WebrtcOffer
        | MessageKind::WebrtcAnswer
        | MessageKind::WebrtcIceCandidate => {}
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;

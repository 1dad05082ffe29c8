//! Bounded, newest-first notification list.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::connection::Connection;
use super::subscription::Subscription;
use crate::envelope::{Envelope, MessageKind};

/// Maximum number of retained notifications. Older entries are dropped on insert.
pub const MAX_NOTIFICATIONS: usize = 50;

/// A received notification as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: Option<String>,
    pub message: Option<String>,
    pub level: Option<String>,
    pub user_id: String,
    /// Envelope timestamp; doubles as the removal key.
    pub timestamp: String,
}

impl Notification {
    fn from_envelope(envelope: &Envelope) -> Option<Self> {
        // Fields are read one by one so a mistyped sibling cannot hide the heartbeat flag.
        if envelope.payload_flag("heartbeat") {
            return None;
        }
        let text = |key: &str| envelope.payload_str(key).map(str::to_owned);
        Some(Self {
            title: text("title"),
            message: text("message"),
            level: text("level"),
            user_id: envelope.user_id.clone(),
            timestamp: envelope.timestamp.clone(),
        })
    }
}

pub struct Notifications {
    items: Arc<watch::Sender<Vec<Notification>>>,
    _subscription: Subscription,
}

impl Notifications {
    #[must_use]
    pub fn attach(connection: &Connection) -> Self {
        let (items, _) = watch::channel(Vec::new());
        let items = Arc::new(items);
        let state = Arc::clone(&items);
        let subscription = connection.subscribe(MessageKind::Notification, move |_, envelope| {
            let Some(notification) = Notification::from_envelope(envelope) else {
                tracing::trace!("heartbeat notification skipped");
                return;
            };
            state.send_modify(|list| {
                list.insert(0, notification);
                list.truncate(MAX_NOTIFICATIONS);
            });
        });
        Self { items, _subscription: subscription }
    }

    /// Newest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.items.borrow().clone()
    }

    /// Every retained notification counts as unread; there is no read flag.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn clear(&self) {
        self.items.send_if_modified(|list| {
            let had_any = !list.is_empty();
            list.clear();
            had_any
        });
    }

    /// Remove every notification stamped with `timestamp`. Returns how many went.
    pub fn remove(&self, timestamp: &str) -> usize {
        let mut removed = 0;
        self.items.send_if_modified(|list| {
            let before = list.len();
            list.retain(|n| n.timestamp != timestamp);
            removed = before - list.len();
            removed > 0
        });
        removed
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Vec<Notification>> {
        self.items.subscribe()
    }
}

#[cfg(test)]
#[path = "notifications_test.rs"]
mod tests;

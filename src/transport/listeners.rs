//! Listener registry used by transports to fan out inbound envelopes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::envelope::Envelope;

/// Callback invoked for every inbound envelope.
pub type MessageListener = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Handle returned by [`Listeners::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered set of listeners.
///
/// `publish` snapshots the list before invoking anything, so listeners may
/// add or remove listeners (including themselves) while being called.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, MessageListener)>>,
}

impl Listeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: MessageListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| *existing != id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `envelope` to every listener in registration order.
    pub fn publish(&self, envelope: &Envelope) {
        let snapshot: Vec<MessageListener> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(envelope);
        }
    }
}

#[cfg(test)]
#[path = "listeners_test.rs"]
mod tests;

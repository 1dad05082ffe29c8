//! Typed message subscription.
//!
//! A [`Subscription`] registers one listener on the transport and forwards
//! only envelopes whose kind is in its [`KindFilter`]. The handler sits in a
//! shared cell, so callers can swap it with [`Subscription::set_handler`]
//! without re-registering; only [`Subscription::resubscribe`] with a
//! different filter does that. Dropping the subscription unregisters it.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::envelope::{Envelope, MessageKind};
use crate::transport::{ListenerId, Transport};

/// Handler invoked with the payload and the full envelope.
pub type Handler = Arc<dyn Fn(&Value, &Envelope) + Send + Sync>;

/// One or more message kinds a subscription accepts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindFilter(Vec<MessageKind>);

impl KindFilter {
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        let mut kinds: Vec<MessageKind> = kinds.into_iter().collect();
        kinds.sort_unstable();
        kinds.dedup();
        Self(kinds)
    }

    #[must_use]
    pub fn matches(&self, kind: MessageKind) -> bool {
        self.0.binary_search(&kind).is_ok()
    }

    #[must_use]
    pub fn kinds(&self) -> &[MessageKind] {
        &self.0
    }
}

impl From<MessageKind> for KindFilter {
    fn from(kind: MessageKind) -> Self {
        Self(vec![kind])
    }
}

impl From<Vec<MessageKind>> for KindFilter {
    fn from(kinds: Vec<MessageKind>) -> Self {
        Self::new(kinds)
    }
}

impl From<&[MessageKind]> for KindFilter {
    fn from(kinds: &[MessageKind]) -> Self {
        Self::new(kinds.iter().copied())
    }
}

impl<const N: usize> From<[MessageKind; N]> for KindFilter {
    fn from(kinds: [MessageKind; N]) -> Self {
        Self::new(kinds)
    }
}

pub struct Subscription {
    transport: Arc<dyn Transport>,
    listener: ListenerId,
    filter: KindFilter,
    handler: Arc<RwLock<Handler>>,
}

impl Subscription {
    pub(crate) fn register(transport: Arc<dyn Transport>, filter: KindFilter, handler: Handler) -> Self {
        let handler = Arc::new(RwLock::new(handler));
        let listener = attach(transport.as_ref(), filter.clone(), &handler);
        Self { transport, listener, filter, handler }
    }

    /// Replace the handler. The transport listener is untouched.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&Value, &Envelope) + Send + Sync + 'static,
    {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(handler);
    }

    /// Change the accepted kinds. Re-registers only when the set differs.
    pub fn resubscribe(&mut self, filter: impl Into<KindFilter>) {
        let filter = filter.into();
        if filter == self.filter {
            return;
        }
        self.transport.remove_listener(self.listener);
        self.listener = attach(self.transport.as_ref(), filter.clone(), &self.handler);
        self.filter = filter;
    }

    #[must_use]
    pub fn kinds(&self) -> &[MessageKind] {
        self.filter.kinds()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.transport.remove_listener(self.listener);
    }
}

fn attach(transport: &dyn Transport, filter: KindFilter, handler: &Arc<RwLock<Handler>>) -> ListenerId {
    let cell = Arc::clone(handler);
    transport.add_listener(Arc::new(move |envelope: &Envelope| {
        if !filter.matches(envelope.kind) {
            return;
        }
        // Clone out of the cell so the handler may call `set_handler`.
        let current = Arc::clone(&*cell.read().unwrap_or_else(PoisonError::into_inner));
        current(&envelope.payload, envelope);
    }))
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;

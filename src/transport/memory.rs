//! In-process transport for tests and offline use.
//!
//! The owner drives it directly: set the status, emit inbound envelopes,
//! and inspect what was sent and which connects were requested.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use super::{ConnectionStatus, ListenerId, Listeners, MessageListener, Transport, TransportError};
use crate::envelope::Envelope;

/// A connect request recorded by [`MemoryTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub token: Option<String>,
}

pub struct MemoryTransport {
    listeners: Listeners,
    status: watch::Sender<ConnectionStatus>,
    sent: Mutex<Vec<Envelope>>,
    send_attempts: AtomicUsize,
    connects: Mutex<Vec<ConnectRequest>>,
    disconnects: Mutex<usize>,
    /// Status applied on `connect`. `Connected` unless overridden.
    connect_result: Mutex<Result<ConnectionStatus, String>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            listeners: Listeners::new(),
            status,
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            connects: Mutex::new(Vec::new()),
            disconnects: Mutex::new(0),
            connect_result: Mutex::new(Ok(ConnectionStatus::Connected)),
        }
    }

    /// Make subsequent `connect` calls fail with `reason`.
    pub fn fail_connects(&self, reason: impl Into<String>) {
        *self.connect_result.lock().unwrap_or_else(PoisonError::into_inner) = Err(reason.into());
    }

    /// Make subsequent `connect` calls stop at `status` instead of `Connected`.
    pub fn connect_to(&self, status: ConnectionStatus) {
        *self.connect_result.lock().unwrap_or_else(PoisonError::into_inner) = Ok(status);
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    /// Deliver an inbound envelope to every listener, synchronously.
    pub fn emit(&self, envelope: &Envelope) {
        self.listeners.publish(envelope);
    }

    /// Envelopes accepted by `send`, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of `send` calls that reached this transport, accepted or not.
    #[must_use]
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn connects(&self) -> Vec<ConnectRequest> {
        self.connects.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &str, token: Option<&str>) -> Result<(), TransportError> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ConnectRequest { url: url.to_owned(), token: token.map(ToOwned::to_owned) });

        let outcome = self.connect_result.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match outcome {
            Ok(status) => {
                self.status.send_replace(status);
                Ok(())
            }
            Err(reason) => {
                self.status.send_replace(ConnectionStatus::Disconnected);
                Err(TransportError::ConnectFailed(reason))
            }
        }
    }

    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.status.borrow().is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(envelope);
        Ok(())
    }

    fn add_listener(&self, listener: MessageListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn disconnect(&self) {
        *self.disconnects.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.status.send_replace(ConnectionStatus::Disconnected);
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

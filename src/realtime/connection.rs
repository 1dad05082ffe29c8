//! Connection handle shared by every realtime feature.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::watch;

use super::subscription::{KindFilter, Subscription};
use crate::auth::TokenStore;
use crate::config::RealtimeConfig;
use crate::envelope::{Envelope, OutboundMessage};
use crate::transport::{ConnectionStatus, Transport, TransportError};

/// Cheap-to-clone handle to the shared realtime connection.
///
/// Clones share one transport and one one-shot init flag. Dropping a clone
/// never closes the transport; only [`Connection::disconnect`] does.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    config: RealtimeConfig,
    initialized: AtomicBool,
    status: watch::Receiver<ConnectionStatus>,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenStore>, config: RealtimeConfig) -> Self {
        let status = transport.watch_status();
        Self { inner: Arc::new(Inner { transport, tokens, config, initialized: AtomicBool::new(false), status }) }
    }

    /// Connect the transport, at most once per connection lifetime.
    ///
    /// Returns `Ok(true)` when this call started the connection and
    /// `Ok(false)` when an earlier call already did.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the connect request fails. The flag
    /// stays set; retrying is the transport's job.
    pub async fn init(&self) -> Result<bool, TransportError> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let token = self.inner.tokens.load_token().await;
        let url = self.inner.config.ws_url.as_str();
        match self.inner.transport.connect(url, token.as_deref()).await {
            Ok(()) => {
                tracing::info!(%url, authenticated = token.is_some(), "realtime connection started");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, %url, "realtime connection init failed");
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Observe status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.clone()
    }

    /// Configured default sender id, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.inner.config.user_id.as_deref()
    }

    /// Complete `message` and hand it to the transport.
    ///
    /// Returns `false` when the transport refuses it (typically because the
    /// connection is down). Nothing is queued.
    pub fn send(&self, message: OutboundMessage) -> bool {
        let envelope = message.into_envelope(self.user_id().unwrap_or_default());
        let kind = envelope.kind;
        match self.inner.transport.send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, %kind, "realtime send dropped");
                false
            }
        }
    }

    /// Close the shared connection.
    pub fn disconnect(&self) {
        tracing::info!("realtime connection closed by client");
        self.inner.transport.disconnect();
    }

    /// Close the shared connection after flushing queued outbound messages.
    pub async fn close(&self) {
        tracing::info!("realtime connection closed by client");
        self.inner.transport.close().await;
    }

    /// Invoke `handler` for every inbound message whose kind is in `filter`.
    pub fn subscribe<F>(&self, filter: impl Into<KindFilter>, handler: F) -> Subscription
    where
        F: Fn(&Value, &Envelope) + Send + Sync + 'static,
    {
        Subscription::register(Arc::clone(&self.inner.transport), filter.into(), Arc::new(handler))
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;

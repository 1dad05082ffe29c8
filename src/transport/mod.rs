//! Transport layer for the realtime channel.
//!
//! DESIGN
//! ======
//! A [`Transport`] owns one live connection: connect, framing, reconnect and
//! status. Everything above it (connection handle, subscriptions, feature
//! state) only observes. The trait is the seam where tests substitute
//! [`memory::MemoryTransport`] for [`ws::WsTransport`].
//!
//! Inbound envelopes are fanned out synchronously to every registered
//! listener, in registration order, on whichever task received the frame.

pub mod listeners;
pub mod memory;
pub mod ws;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::envelope::Envelope;
pub use listeners::{ListenerId, Listeners, MessageListener};

/// Connection state of a transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("connection already started")]
    AlreadyConnected,
    #[error("invalid socket url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("invalid bearer token")]
    InvalidToken,
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("envelope codec error: {0}")]
    Codec(#[from] crate::envelope::CodecError),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

/// A single shared realtime connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Start connecting to `url`, authenticating with `token` when given.
    async fn connect(&self, url: &str, token: Option<&str>) -> Result<(), TransportError>;

    /// Hand an envelope to the connection for delivery.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] when the status is not `Connected`.
    fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Register a listener for every inbound envelope.
    fn add_listener(&self, listener: MessageListener) -> ListenerId;

    /// Unregister a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);

    /// Observe status changes.
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Current status.
    fn status(&self) -> ConnectionStatus {
        *self.watch_status().borrow()
    }

    /// Close the connection and stop reconnecting.
    fn disconnect(&self);

    /// Like [`Transport::disconnect`], but resolves once frames already
    /// accepted by `send` have been handed to the network.
    async fn close(&self) {
        self.disconnect();
    }
}

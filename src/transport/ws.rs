//! WebSocket transport with reconnect.
//!
//! DESIGN
//! ======
//! `connect` validates the URL and token, then spawns one session task that
//! owns the socket. The task connects, pumps outbound frames from an
//! unbounded channel and fans inbound frames out to listeners, and on any
//! close or error waits out an exponential backoff before trying again.
//! `disconnect` (or dropping the transport) signals the task through a
//! `watch` shutdown flag and stops the loop; `close` does the same and then
//! waits for the task, which writes out queued frames before the close frame.
//!
//! Every `connect` and `stop` bumps a generation counter held under the same
//! lock as the outbound sender. A session task only touches the sender and
//! the status while its generation is current, so a task still winding down
//! after `disconnect` cannot clobber the session that replaced it.
//!
//! Frames are JSON text. Binary frames are ignored; pings are answered by
//! tungstenite. Inbound frames with an unknown `type` are logged and dropped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{ConnectionStatus, ListenerId, Listeners, MessageListener, Transport, TransportError};
use crate::config::ReconnectConfig;
use crate::envelope::{CodecError, Envelope, decode_envelope, encode_envelope};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    shared: Arc<Shared>,
}

struct Shared {
    listeners: Listeners,
    status: watch::Sender<ConnectionStatus>,
    live: Mutex<Live>,
    session: Mutex<Option<Session>>,
    reconnect: ReconnectConfig,
}

#[derive(Default)]
struct Live {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

struct Session {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WsTransport {
    #[must_use]
    pub fn new(reconnect: ReconnectConfig) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                listeners: Listeners::new(),
                status,
                live: Mutex::new(Live::default()),
                session: Mutex::new(None),
                reconnect,
            }),
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        drop(self.shared.stop());
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str, token: Option<&str>) -> Result<(), TransportError> {
        let auth = match token {
            Some(token) => Some(
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| TransportError::InvalidToken)?,
            ),
            None => None,
        };
        // Validate once up front; the session loop rebuilds per attempt.
        build_request(url, auth.as_ref())?;

        let mut session = self.shared.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return Err(TransportError::AlreadyConnected);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let generation = self.shared.begin(ConnectionStatus::Connecting);
        let task = tokio::spawn(session_loop(
            Arc::clone(&self.shared),
            generation,
            url.to_owned(),
            auth,
            shutdown_rx,
        ));
        *session = Some(Session { shutdown, task });
        Ok(())
    }

    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if !self.shared.status.borrow().is_connected() {
            return Err(TransportError::NotConnected);
        }
        let text = encode_envelope(&envelope)?;
        let live = self.shared.live.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = live.outbound.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        tx.send(Message::Text(text.into()))
            .map_err(|_| TransportError::NotConnected)
    }

    fn add_listener(&self, listener: MessageListener) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.shared.listeners.remove(id);
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    fn disconnect(&self) {
        // The retired task finishes on its own.
        drop(self.shared.stop());
    }

    async fn close(&self) {
        if let Some(task) = self.shared.stop() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "realtime session task ended abnormally");
            }
        }
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Start a new generation, retiring whatever session held the old one.
    fn begin(&self, status: ConnectionStatus) -> u64 {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        live.generation = live.generation.wrapping_add(1);
        live.outbound = None;
        self.set_status(status);
        live.generation
    }

    /// Apply a session's outbound sender and status if `generation` is still current.
    fn update(&self, generation: u64, outbound: Option<mpsc::UnboundedSender<Message>>, status: ConnectionStatus) -> bool {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if live.generation != generation {
            return false;
        }
        live.outbound = outbound;
        self.set_status(status);
        true
    }

    /// Signal shutdown and retire the session. Returns its task for callers that wait.
    fn stop(&self) -> Option<JoinHandle<()>> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.begin(ConnectionStatus::Disconnected);
        session.map(|session| {
            session.shutdown.send_replace(true);
            session.task
        })
    }

    fn dispatch_text(&self, text: &str) {
        match decode_envelope(text) {
            Ok(envelope) => self.listeners.publish(&envelope),
            Err(CodecError::UnknownKind(kind)) => {
                tracing::warn!(%kind, "dropping realtime message with unknown type");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed realtime message");
            }
        }
    }
}

fn build_request(url: &str, auth: Option<&HeaderValue>) -> Result<Request, TransportError> {
    let mut request = url.into_client_request().map_err(|e| TransportError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    if let Some(auth) = auth {
        request.headers_mut().insert(AUTHORIZATION, auth.clone());
    }
    Ok(request)
}

/// Connection loop with reconnect logic.
async fn session_loop(
    shared: Arc<Shared>,
    generation: u64,
    url: String,
    auth: Option<HeaderValue>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() || !shared.update(generation, None, ConnectionStatus::Connecting) {
            break;
        }

        let request = match build_request(&url, auth.as_ref()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "realtime request build failed");
                break;
            }
        };

        let attempt = tokio::select! {
            result = connect_async(request) => result,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok((socket, _)) => {
                failures = 0;
                tracing::info!(%url, "realtime socket connected");
                run_socket(&shared, generation, socket, &mut shutdown).await;
                tracing::info!(%url, "realtime socket closed");
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                tracing::warn!(error = %e, %url, failures, "realtime connect failed");
            }
        }

        shared.update(generation, None, ConnectionStatus::Disconnected);

        if *shutdown.borrow() {
            break;
        }
        if shared.reconnect.exhausted(failures) {
            tracing::warn!(%url, failures, "realtime reconnect attempts exhausted");
            break;
        }

        let delay = with_jitter(shared.reconnect.delay_for_attempt(failures.saturating_sub(1)));
        tracing::debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "realtime reconnect scheduled");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    shared.update(generation, None, ConnectionStatus::Disconnected);
}

/// Pump one live socket until it closes or errors or shutdown is signalled.
async fn run_socket(shared: &Shared, generation: u64, socket: Socket, shutdown: &mut watch::Receiver<bool>) {
    let (mut write, mut read) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    if !shared.update(generation, Some(tx), ConnectionStatus::Connected) {
        let _ = write.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                // The sender is retired on stop; close politely.
                let Some(message) = outgoing else {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = write.send(message).await {
                    tracing::warn!(error = %e, "realtime send failed");
                    break;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => shared.dispatch_text(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "realtime receive failed");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                // Frames accepted by `send` before shutdown still go out.
                while let Ok(message) = rx.try_recv() {
                    if let Err(e) = write.send(message).await {
                        tracing::warn!(error = %e, "realtime send failed while closing");
                        break;
                    }
                }
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }

    shared.update(generation, None, ConnectionStatus::Disconnected);
}

/// Add up to 10% random jitter.
fn with_jitter(delay: Duration) -> Duration {
    let max_extra = u64::try_from(delay.as_millis() / 10).unwrap_or(0);
    if max_extra == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=max_extra))
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

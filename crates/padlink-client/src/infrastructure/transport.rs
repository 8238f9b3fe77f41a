//! Reconnecting WebSocket transport to the host.
//!
//! Architecture:
//! - [`TransportChannel`] is a cheap handle; clones share one connection.
//! - `connect()` spawns a supervisor task that owns the socket.  While a
//!   socket is open, outbound text frames flow through an unbounded queue
//!   installed by the supervisor; with no socket, `send` drops.
//! - Inbound text frames are decoded and delivered to every subscriber of
//!   the message's `type` tag.  Binary frames go to a broadcast channel.
//! - After an unexpected close or a failed connect the supervisor waits
//!   `min(base * 2^attempt, max)` and tries again, indefinitely.
//! - `close()` raises the shutdown flag and clears subscribers before the
//!   socket closes, then waits for the supervisor to exit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    handshake::client::Request,
    http::{header::AUTHORIZATION, HeaderValue},
    Message as WsMessage,
};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use padlink_core::protocol::{decode_server_message, encode_client_message};
use padlink_core::{ClientMessage, Intent, ServerMessage};

use crate::application::{Backoff, MessageSink};
use crate::domain::TransportConfig;

/// Binary frames buffered per lagging `frames()` receiver.
const FRAME_CHANNEL_CAPACITY: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    /// The token contains bytes that cannot appear in an HTTP header.
    #[error("access token is not a valid header value")]
    InvalidToken,
    #[error("transport has been closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    /// Terminal; entered by [`TransportChannel::close`].
    Closed,
}

struct Inner {
    config: TransportConfig,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<ServerMessage>>>>,
    frames: broadcast::Sender<Vec<u8>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the client's link with the host.
#[derive(Clone)]
pub struct TransportChannel {
    inner: Arc<Inner>,
}

impl TransportChannel {
    /// Creates a channel in the `Disconnected` state.  Nothing is dialled
    /// until [`connect`](Self::connect).
    pub fn new(config: TransportConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                state,
                shutdown,
                outbound: Mutex::new(None),
                subscribers: Mutex::new(HashMap::new()),
                frames,
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Starts the supervisor.  Calling it again while one runs does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] after [`close`](Self::close); URL and token
    /// errors are reported here rather than on every reconnect.
    pub fn connect(&self) -> Result<(), TransportError> {
        if self.state() == ConnectionState::Closed {
            return Err(TransportError::Closed);
        }
        self.inner.request()?;

        let mut supervisor = lock(&self.inner.supervisor);
        if supervisor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("connect: supervisor already running");
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        *supervisor = Some(tokio::spawn(supervise(inner)));
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Sends `msg` if the link is open; otherwise drops it and returns `false`.
    pub fn send(&self, msg: &ClientMessage) -> bool {
        if self.state() != ConnectionState::Connected {
            debug!("not connected; dropping {}", msg.type_tag());
            return false;
        }
        let text = match encode_client_message(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode {}: {e}", msg.type_tag());
                return false;
            }
        };
        self.enqueue(WsMessage::Text(text))
    }

    pub fn send_intent(&self, intent: Intent) -> bool {
        self.send(&ClientMessage::from(intent))
    }

    /// Sends an opaque binary frame (screen data from a producer).
    pub fn send_frame(&self, bytes: Vec<u8>) -> bool {
        self.state() == ConnectionState::Connected && self.enqueue(WsMessage::Binary(bytes))
    }

    fn enqueue(&self, frame: WsMessage) -> bool {
        lock(&self.inner.outbound)
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// Receives every inbound message whose `type` is `type_tag`.
    ///
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe(&self, type_tag: &str) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.subscribers)
            .entry(type_tag.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Receives inbound binary frames.
    pub fn frames(&self) -> broadcast::Receiver<Vec<u8>> {
        self.inner.frames.subscribe()
    }

    /// Tears the channel down for good.
    ///
    /// Subscribers are dropped before the socket closes, so no message
    /// arrives after this starts.  Waits for the supervisor to exit.
    pub async fn close(&self) {
        self.inner.shutdown.send_replace(true);
        lock(&self.inner.subscribers).clear();
        lock(&self.inner.outbound).take();

        let handle = lock(&self.inner.supervisor).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("transport supervisor panicked: {e}");
            }
        }
        self.inner.state.send_replace(ConnectionState::Closed);
        info!("transport closed");
    }
}

impl MessageSink for TransportChannel {
    fn send(&self, msg: &ClientMessage) -> bool {
        TransportChannel::send(self, msg)
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

async fn supervise(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown.subscribe();
    let mut backoff = Backoff::new(inner.config.backoff_base, inner.config.backoff_max);
    let url = inner.config.url.clone();

    loop {
        if *shutdown.borrow() {
            break;
        }
        inner.set_state(ConnectionState::Connecting);

        let request = match inner.request() {
            Ok(request) => request,
            Err(e) => {
                error!("{e}");
                break;
            }
        };
        let attempt = tokio::select! {
            result = connect_async(request) => result,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok((socket, _)) => {
                info!("connected to {url}");
                backoff.reset();
                inner.run_connection(socket, &mut shutdown).await;
                info!("disconnected from {url}");
            }
            Err(e) => warn!("could not connect to {url}: {e}"),
        }

        if *shutdown.borrow() {
            break;
        }
        inner.set_state(ConnectionState::Disconnected);
        let delay = backoff.next_delay();
        info!("reconnecting in {delay:?} (attempt {})", backoff.attempt());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    inner.state.send_replace(ConnectionState::Closed);
    debug!("transport supervisor stopped");
}

impl Inner {
    fn request(&self) -> Result<Request, TransportError> {
        let url = &self.config.url;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|source| TransportError::InvalidUrl {
                url: url.clone(),
                source,
            })?;
        if let Some(token) = &self.config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| TransportError::InvalidToken)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    /// Moves to `next` unless the channel is already closed.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next || *current == ConnectionState::Closed {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Pumps one open socket until it closes, fails, or shutdown is raised.
    async fn run_connection(&self, socket: Socket, shutdown: &mut watch::Receiver<bool>) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel();
        *lock(&self.outbound) = Some(tx);
        self.set_state(ConnectionState::Connected);

        loop {
            tokio::select! {
                Some(frame) = rx.recv() => {
                    if let Err(e) = sink.send(frame).await {
                        warn!("send failed: {e}");
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(WsMessage::Text(text))) => self.deliver(&text),
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        // No receivers is fine; frames are only for mirrors.
                        let _ = self.frames.send(bytes);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("read error: {e}");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    if let Err(e) = sink.close().await {
                        debug!("close handshake failed: {e}");
                    }
                    break;
                }
            }
        }

        lock(&self.outbound).take();
    }

    fn deliver(&self, text: &str) {
        let msg = match decode_server_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("dropping inbound frame: {e}");
                return;
            }
        };
        let tag = msg.type_tag();
        let mut subscribers = lock(&self.subscribers);
        match subscribers.get_mut(tag) {
            Some(list) => {
                list.retain(|tx| tx.send(msg.clone()).is_ok());
                if list.is_empty() {
                    subscribers.remove(tag);
                }
            }
            None => debug!("no subscriber for {tag}; dropped"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

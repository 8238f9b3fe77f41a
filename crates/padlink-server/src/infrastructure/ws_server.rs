//! WebSocket server: accept loop, upgrade policy and per-connection tasks.
//!
//! Each accepted connection runs three pieces:
//!
//! 1. **Reader** (the session task itself): decodes text frames, routes them
//!    through the [`ControlPlane`], relays binary frames from producers.
//! 2. **Writer**: owns the socket's sink and drains the connection's
//!    [`Outbound`] queue, keeping the buffered-byte count current for the
//!    screen relay's backpressure check.
//! 3. **Dispatcher**: owns the connection's [`InputDispatcher`] and fires its
//!    throttle deadlines.  It stops when the reader drops the job channel, so
//!    no trailing move outlives the connection.
//!
//! Shutdown is triggered by clearing the shared `running` flag; the accept
//! loop checks it every 200 ms.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::{header::AUTHORIZATION, StatusCode, Uri},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use padlink_core::protocol::{decode_client_message, encode_server_message};
use padlink_core::ServerMessage;

use crate::application::{
    ActuatorQueue, ConsumerHandle, ControlPlane, DispatchError, DispatchJob, DispatchSettings,
    InputActuator, InputDispatcher, LiveSettings, Outbound, Routed, ScreenRelay, SessionState,
    SettingsStore, TokenAuthority,
};
use crate::domain::{ServerConfig, ServerSettings};
use crate::infrastructure::net::is_loopback;

/// Only path that accepts a WebSocket upgrade.
pub const WS_PATH: &str = "/ws";

/// Dispatch jobs a connection may queue before its reader waits.
const JOB_QUEUE_DEPTH: usize = 256;

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything a connection needs, shared across all connections.
#[derive(Clone)]
pub struct ServerState {
    pub control: Arc<ControlPlane>,
    pub queue: ActuatorQueue,
    copy_settle: Duration,
}

impl ServerState {
    pub fn new(
        config: &ServerConfig,
        settings: ServerSettings,
        store: Arc<dyn SettingsStore>,
        actuator: Arc<dyn InputActuator>,
        detected_ip: String,
    ) -> Self {
        let control = ControlPlane::new(
            Arc::new(TokenAuthority::new()),
            Arc::new(ScreenRelay::new(config.backpressure_bytes)),
            Arc::new(LiveSettings::new(settings, store)),
            detected_ip,
        );
        Self {
            control: Arc::new(control),
            queue: ActuatorQueue::new(actuator),
            copy_settle: config.copy_settle,
        }
    }

    fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            swipe: self.control.settings.snapshot().swipe,
            copy_settle: self.copy_settle,
            ..DispatchSettings::default()
        }
    }
}

// ── Upgrade policy ────────────────────────────────────────────────────────────

/// Why an upgrade request was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Not Found")]
    NotFound,
    #[error("Unauthorized")]
    Unauthorized,
}

impl Rejection {
    fn status(self) -> StatusCode {
        match self {
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn into_response(self) -> ErrorResponse {
        let mut response = ErrorResponse::new(Some(self.to_string()));
        *response.status_mut() = self.status();
        response
    }
}

/// Decides whether an upgrade request may proceed.
///
/// Returns the valid token the client presented, if any.  Loopback peers
/// need no token; everyone else must present a valid one either as
/// `Authorization: Bearer <token>` or as a `token` query parameter.
pub fn check_upgrade(
    uri: &Uri,
    authorization: Option<&str>,
    loopback: bool,
    tokens: &TokenAuthority,
) -> Result<Option<String>, Rejection> {
    if uri.path() != WS_PATH {
        return Err(Rejection::NotFound);
    }

    let presented = authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .or_else(|| query_token(uri));
    let valid = presented.filter(|t| tokens.is_valid(t)).map(str::to_owned);

    match (loopback, valid) {
        (_, Some(token)) => Ok(Some(token)),
        (true, None) => Ok(None),
        (false, None) => Err(Rejection::Unauthorized),
    }
}

fn query_token(uri: &Uri) -> Option<&str> {
    uri.query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: &ServerConfig,
    state: ServerState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;
    info!("padlink listening on ws://{}{WS_PATH}", config.bind_addr);
    run_server_on(listener, state, running).await
}

/// Serves on an already-bound listener until `running` is cleared.
pub async fn run_server_on(
    listener: TcpListener,
    state: ServerState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("tcp connection from {peer}");
                let state = state.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer, state).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
    Ok(())
}

// ── Per-connection tasks ──────────────────────────────────────────────────────

async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: ServerState) {
    match run_session(stream, peer, state).await {
        Ok(()) => debug!("connection from {peer} finished"),
        Err(e) => warn!("connection from {peer} ended with error: {e:#}"),
    }
}

async fn run_session(stream: TcpStream, peer: SocketAddr, state: ServerState) -> anyhow::Result<()> {
    let loopback = is_loopback(&peer);

    let mut granted: Option<Option<String>> = None;
    let tokens = Arc::clone(&state.control.tokens);
    let ws = accept_hdr_async(stream, |request: &Request, response: Response| {
        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        match check_upgrade(request.uri(), authorization, loopback, &tokens) {
            Ok(token) => {
                granted = Some(token);
                Ok(response)
            }
            Err(rejection) => {
                warn!("upgrade from {peer} refused: {rejection}");
                Err(rejection.into_response())
            }
        }
    })
    .await
    .with_context(|| format!("WebSocket handshake with {peer} failed"))?;
    let token = granted.flatten();

    let id = Uuid::new_v4();
    info!(
        "connection {id}: accepted from {peer} (loopback: {loopback}, token: {})",
        token.is_some()
    );

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (handle, mut outbound) = ConsumerHandle::new(id);

    // ── Writer ────────────────────────────────────────────────────────────
    let writer_handle = handle.clone();
    let writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            let len = item.byte_len();
            let frame = match item {
                Outbound::Text(text) => WsMessage::Text(text),
                Outbound::Binary(bytes) => WsMessage::Binary(bytes),
                Outbound::Close => break,
            };
            let sent = ws_tx.send(frame).await;
            writer_handle.mark_flushed(len);
            if let Err(e) = sent {
                debug!("connection {id}: write failed: {e}");
                return;
            }
        }
        let _ = ws_tx.close().await;
    });

    send_message(&handle, &state.control.greeting());

    // ── Dispatcher ────────────────────────────────────────────────────────
    let (job_tx, job_rx) = mpsc::channel(JOB_QUEUE_DEPTH);
    let dispatcher = InputDispatcher::new(
        state.queue.clone(),
        state.control.settings.throttle_ms(),
        state.dispatch_settings(),
    );
    let dispatch_task = tokio::spawn(run_dispatcher(id, dispatcher, job_rx, handle.clone()));

    // ── Reader ────────────────────────────────────────────────────────────
    let mut session = SessionState::new(handle.clone(), loopback, token);
    while let Some(frame) = ws_rx.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                debug!("connection {id}: closed by peer");
                break;
            }
            Err(e) => {
                warn!("connection {id}: read error: {e}");
                break;
            }
        };

        match msg {
            WsMessage::Text(raw) => {
                let decoded = match decode_client_message(&raw) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!("connection {id}: text frame dropped: {e}");
                        continue;
                    }
                };
                debug!("connection {id}: {}", decoded.type_tag());
                match state
                    .control
                    .route(&mut session, decoded, std::time::Instant::now())
                {
                    Routed::Reply(reply) => send_message(&handle, &reply),
                    Routed::Dispatch(job) => {
                        if job_tx.send(job).await.is_err() {
                            warn!("connection {id}: dispatcher stopped");
                            break;
                        }
                    }
                    Routed::Handled => {}
                }
            }
            WsMessage::Binary(frame) => {
                if let Some(report) = state.control.relay_frame(&session, &frame) {
                    trace!(
                        "connection {id}: frame of {} bytes to {} mirrors ({} skipped)",
                        frame.len(),
                        report.delivered,
                        report.skipped
                    );
                }
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => {
                debug!("connection {id}: close frame received");
                break;
            }
            WsMessage::Frame(_) => {}
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────
    state.control.disconnect(&session);
    drop(job_tx);
    let _ = dispatch_task.await;
    handle.close();
    let _ = writer.await;
    info!("connection {id}: closed");
    Ok(())
}

/// Applies dispatch jobs in order and fires coalescing deadlines.
async fn run_dispatcher(
    id: Uuid,
    mut dispatcher: InputDispatcher,
    mut jobs: mpsc::Receiver<DispatchJob>,
    reply: ConsumerHandle,
) {
    loop {
        let deadline = dispatcher.next_flush();
        tokio::select! {
            job = jobs.recv() => {
                let Some(job) = job else { break };
                match job {
                    DispatchJob::Input(intent) => {
                        let kind = intent.kind();
                        if let Err(e) = dispatcher.submit(intent, Instant::now()).await {
                            log_dispatch_error(id, kind, &e);
                        }
                    }
                    DispatchJob::Copy => match dispatcher.copy().await {
                        Ok(text) => send_message(&reply, &ServerMessage::ClipboardSync { text }),
                        Err(e) => log_dispatch_error(id, "copy", &e),
                    },
                    DispatchJob::Paste(text) => {
                        if let Err(e) = dispatcher.paste(text.as_deref()).await {
                            log_dispatch_error(id, "paste", &e);
                        }
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Err(e) = dispatcher.flush_due(Instant::now()).await {
                    log_dispatch_error(id, "flush", &e);
                }
            }
        }
    }
    debug!("connection {id}: dispatcher stopped");
}

fn log_dispatch_error(id: Uuid, kind: &str, e: &DispatchError) {
    match e {
        DispatchError::Rejected { .. } => warn!("connection {id}: {e}"),
        DispatchError::Actuator(_) => error!("connection {id}: {kind} failed: {e}"),
    }
}

fn send_message(handle: &ConsumerHandle, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(text) => {
            if !handle.send_text(text) {
                debug!("connection {}: {} not sent, writer gone", handle.id(), msg.type_tag());
            }
        }
        Err(e) => error!("connection {}: could not encode {}: {e}", handle.id(), msg.type_tag()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_wrong_path_is_not_found_even_for_loopback() {
        let tokens = TokenAuthority::new();
        assert_eq!(
            check_upgrade(&uri("/socket"), None, true, &tokens),
            Err(Rejection::NotFound)
        );
    }

    #[test]
    fn test_loopback_needs_no_token() {
        let tokens = TokenAuthority::new();
        assert_eq!(check_upgrade(&uri("/ws"), None, true, &tokens), Ok(None));
    }

    #[test]
    fn test_remote_without_token_is_unauthorized() {
        let tokens = TokenAuthority::new();
        assert_eq!(
            check_upgrade(&uri("/ws"), None, false, &tokens),
            Err(Rejection::Unauthorized)
        );
        assert_eq!(
            check_upgrade(&uri("/ws?token=bogus"), Some("Bearer bogus"), false, &tokens),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn test_remote_with_bearer_or_query_token_is_accepted() {
        // Arrange
        let tokens = TokenAuthority::new();
        let token = tokens.issue();
        let header = format!("Bearer {token}");
        let query = uri(&format!("/ws?foo=1&token={token}"));

        // Act
        let via_header = check_upgrade(&uri("/ws"), Some(&header), false, &tokens);
        let via_query = check_upgrade(&query, None, false, &tokens);

        // Assert
        assert_eq!(via_header, Ok(Some(token.clone())));
        assert_eq!(via_query, Ok(Some(token)));
    }

    #[test]
    fn test_revoked_token_is_unauthorized() {
        let tokens = TokenAuthority::new();
        let token = tokens.issue();
        tokens.revoke(&token);
        let header = format!("Bearer {token}");
        assert_eq!(
            check_upgrade(&uri("/ws"), Some(&header), false, &tokens),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn test_rejection_response_carries_status() {
        let response = Rejection::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.body().as_deref(), Some("Unauthorized"));
    }
}

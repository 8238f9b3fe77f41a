//! Integration tests for the reconnecting transport against a minimal
//! in-process WebSocket server on 127.0.0.1.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use padlink_client::domain::TransportConfig;
use padlink_client::infrastructure::{ConnectionState, TransportChannel};
use padlink_core::protocol::{decode_client_message, encode_server_message};
use padlink_core::{ClientMessage, Intent, ServerMessage};

type ServerSide = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(3);

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

fn fast_config(url: &str, token: Option<&str>) -> TransportConfig {
    TransportConfig {
        url: url.to_string(),
        token: token.map(str::to_string),
        backoff_base: Duration::from_millis(20),
        backoff_max: Duration::from_millis(100),
    }
}

/// Accepts one upgrade and returns the socket plus its Authorization header.
async fn accept_one(listener: &TcpListener) -> (ServerSide, Option<String>) {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("client never dialled")
        .unwrap();
    let mut auth = None;
    let ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
        auth = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(resp)
    })
    .await
    .unwrap();
    (ws, auth)
}

async fn wait_for_state(channel: &TransportChannel, want: ConnectionState) {
    let mut changes = channel.state_changes();
    timeout(WAIT, changes.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("never reached {want:?}"))
        .expect("state sender dropped");
}

async fn server_send(ws: &mut ServerSide, msg: &ServerMessage) {
    let text = encode_server_message(msg).unwrap();
    ws.send(WsMessage::Text(text)).await.unwrap();
}

async fn server_recv(ws: &mut ServerSide) -> ClientMessage {
    match timeout(WAIT, ws.next()).await.expect("no frame").unwrap().unwrap() {
        WsMessage::Text(text) => decode_client_message(&text).unwrap(),
        other => panic!("expected text, got {other:?}"),
    }
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_is_sent_and_greeting_reaches_subscriber() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, Some("c0ffee")));
    let mut greetings = channel.subscribe("connected");

    // Act
    channel.connect().unwrap();
    let (mut ws, auth) = accept_one(&listener).await;
    let greeting = ServerMessage::Connected {
        server_ip: "192.168.1.9".into(),
        platform: None,
    };
    server_send(&mut ws, &greeting).await;

    // Assert
    assert_eq!(auth.as_deref(), Some("Bearer c0ffee"));
    assert_eq!(timeout(WAIT, greetings.recv()).await.unwrap(), Some(greeting));
    channel.close().await;
}

#[tokio::test]
async fn test_connect_twice_dials_once() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, None));

    // Act
    channel.connect().unwrap();
    channel.connect().unwrap();
    let (_ws, _) = accept_one(&listener).await;
    let second = timeout(Duration::from_millis(200), listener.accept()).await;

    // Assert
    assert!(second.is_err(), "a second supervisor dialled the server");
    channel.close().await;
}

// ── Traffic ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_is_dropped_until_connected() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, None));
    assert!(!channel.send(&ClientMessage::GetIp));

    // Act
    channel.connect().unwrap();
    let (mut ws, _) = accept_one(&listener).await;
    wait_for_state(&channel, ConnectionState::Connected).await;
    assert!(channel.send_intent(Intent::Key { name: "enter".into() }));
    assert!(channel.send(&ClientMessage::GetIp));

    // Assert
    assert_eq!(server_recv(&mut ws).await, ClientMessage::Key { key: "enter".into() });
    assert_eq!(server_recv(&mut ws).await, ClientMessage::GetIp);
    channel.close().await;
}

#[tokio::test]
async fn test_binary_frames_reach_frame_receivers() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, None));
    let mut frames = channel.frames();
    channel.connect().unwrap();
    let (mut ws, _) = accept_one(&listener).await;

    // Act
    ws.send(WsMessage::Binary(vec![0xAB, 0xCD])).await.unwrap();

    // Assert
    assert_eq!(timeout(WAIT, frames.recv()).await.unwrap().unwrap(), vec![0xAB, 0xCD]);
    channel.close().await;
}

// ── Reconnect and teardown ────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnects_after_server_closes() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, None));
    channel.connect().unwrap();
    let (mut first, _) = accept_one(&listener).await;
    wait_for_state(&channel, ConnectionState::Connected).await;

    // Act
    first.close(None).await.unwrap();
    drop(first);
    let (mut second, _) = accept_one(&listener).await;
    wait_for_state(&channel, ConnectionState::Connected).await;
    channel.send(&ClientMessage::GetIp);

    // Assert
    assert_eq!(server_recv(&mut second).await, ClientMessage::GetIp);
    channel.close().await;
}

#[tokio::test]
async fn test_failed_handshakes_are_retried_until_one_succeeds() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, None));
    channel.connect().unwrap();

    // Act: hang up on the first two attempts before the upgrade
    for _ in 0..2 {
        let (stream, _) = timeout(WAIT, listener.accept()).await.expect("no retry").unwrap();
        drop(stream);
    }
    let (_ws, _) = accept_one(&listener).await;

    // Assert
    wait_for_state(&channel, ConnectionState::Connected).await;
    channel.close().await;
    assert_eq!(channel.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_close_ends_subscriptions_and_stops_reconnecting() {
    // Arrange
    let (listener, url) = listen().await;
    let channel = TransportChannel::new(fast_config(&url, None));
    let mut replies = channel.subscribe("server-ip");
    channel.connect().unwrap();
    let (_ws, _) = accept_one(&listener).await;
    wait_for_state(&channel, ConnectionState::Connected).await;

    // Act
    channel.close().await;
    let redial = timeout(Duration::from_millis(300), listener.accept()).await;

    // Assert
    assert_eq!(channel.state(), ConnectionState::Closed);
    assert_eq!(timeout(WAIT, replies.recv()).await.unwrap(), None);
    assert!(redial.is_err(), "client reconnected after close");
    assert!(!channel.send(&ClientMessage::GetIp));
}

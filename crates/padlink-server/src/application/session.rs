//! Per-connection control messages: routing of everything that is not input.
//!
//! [`ControlPlane::route`] is the single place that decides what a decoded
//! [`ClientMessage`] does.  Input intents and clipboard requests are handed
//! back as a [`DispatchJob`] for the connection's dispatcher task; control
//! messages (mirroring, tokens, settings) are handled inline and may produce
//! an immediate reply.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use padlink_core::{ClientMessage, Intent, ServerMessage};

use super::relay::{ConsumerHandle, RelayReport, ScreenRelay};
use super::settings::LiveSettings;
use super::tokens::{TokenAuthority, TOUCH_INTERVAL};

/// State of one accepted connection.
#[derive(Debug)]
pub struct SessionState {
    pub id: Uuid,
    /// Peer connected over a loopback interface.
    pub loopback: bool,
    /// Token presented on the upgrade request, if any.
    pub token: Option<String>,
    /// Binary frames from this connection are relayed to mirrors.
    pub producer: bool,
    pub handle: ConsumerHandle,
    /// When this connection last refreshed its token.
    pub last_touch: Option<Instant>,
}

impl SessionState {
    pub fn new(handle: ConsumerHandle, loopback: bool, token: Option<String>) -> Self {
        Self {
            id: handle.id(),
            loopback,
            token,
            producer: false,
            handle,
            last_touch: None,
        }
    }
}

/// Work for the connection's dispatcher task.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchJob {
    Input(Intent),
    Copy,
    Paste(Option<String>),
}

/// What the connection should do after routing a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Reply(ServerMessage),
    Dispatch(DispatchJob),
    Handled,
}

/// Shared server-wide state used by every connection.
pub struct ControlPlane {
    pub tokens: Arc<TokenAuthority>,
    pub relay: Arc<ScreenRelay>,
    pub settings: Arc<LiveSettings>,
    detected_ip: String,
}

impl ControlPlane {
    pub fn new(
        tokens: Arc<TokenAuthority>,
        relay: Arc<ScreenRelay>,
        settings: Arc<LiveSettings>,
        detected_ip: String,
    ) -> Self {
        Self {
            tokens,
            relay,
            settings,
            detected_ip,
        }
    }

    /// Address advertised to clients: the configured override, else the
    /// detected LAN address.
    pub fn server_ip(&self) -> String {
        self.settings
            .snapshot()
            .address
            .unwrap_or_else(|| self.detected_ip.clone())
    }

    /// The greeting sent as the first frame of every connection.
    pub fn greeting(&self) -> ServerMessage {
        ServerMessage::Connected {
            server_ip: self.server_ip(),
            platform: Some(std::env::consts::OS.to_string()),
        }
    }

    pub fn route(&self, session: &mut SessionState, msg: ClientMessage, now: Instant) -> Routed {
        let id = session.id;
        if !matches!(msg, ClientMessage::GetIp | ClientMessage::GenerateToken) {
            if let Some(token) = &session.token {
                let due = session
                    .last_touch
                    .map_or(true, |at| now.saturating_duration_since(at) >= TOUCH_INTERVAL);
                if due && self.tokens.touch_at(token, now) {
                    session.last_touch = Some(now);
                }
            }
        }

        match msg {
            ClientMessage::GetIp => Routed::Reply(ServerMessage::ServerIp {
                ip: self.server_ip(),
            }),
            ClientMessage::GenerateToken => {
                if !session.loopback {
                    warn!("connection {id}: token request from non-loopback peer refused");
                    return Routed::Reply(ServerMessage::AuthError {
                        error: "Token generation is only allowed from the host".to_string(),
                    });
                }
                Routed::Reply(ServerMessage::TokenGenerated {
                    token: self.tokens.issue(),
                })
            }
            ClientMessage::StartMirror => {
                self.relay.start_mirror(session.handle.clone());
                Routed::Handled
            }
            ClientMessage::StopMirror => {
                self.relay.stop_mirror(id);
                Routed::Handled
            }
            ClientMessage::StartProvider => {
                session.producer = true;
                info!("connection {id}: screen provider started");
                Routed::Handled
            }
            ClientMessage::StopProvider => {
                session.producer = false;
                info!("connection {id}: screen provider stopped");
                Routed::Handled
            }
            ClientMessage::UpdateConfig { config } => match self.settings.update(&config) {
                Ok(_) => Routed::Reply(ServerMessage::config_ok()),
                Err(e) => {
                    debug!("connection {id}: config update rejected: {e}");
                    Routed::Reply(ServerMessage::config_failed(e.to_string()))
                }
            },
            ClientMessage::Copy => Routed::Dispatch(DispatchJob::Copy),
            ClientMessage::Paste { text } => Routed::Dispatch(DispatchJob::Paste(text)),
            input => match input.into_intent() {
                Some(intent) => Routed::Dispatch(DispatchJob::Input(intent)),
                None => Routed::Handled,
            },
        }
    }

    /// Relays a binary frame if `session` is a producer.
    pub fn relay_frame(&self, session: &SessionState, frame: &[u8]) -> Option<RelayReport> {
        if !session.producer {
            debug!("connection {}: binary frame from non-producer ignored", session.id);
            return None;
        }
        Some(self.relay.relay(session.id, frame))
    }

    /// Cleans up server-wide state held for a closing connection.
    pub fn disconnect(&self, session: &SessionState) {
        self.relay.stop_mirror(session.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::settings::MemorySettingsStore;
    use crate::domain::ServerSettings;
    use serde_json::json;
    use std::time::Duration;

    fn control_plane() -> ControlPlane {
        ControlPlane::new(
            Arc::new(TokenAuthority::new()),
            Arc::new(ScreenRelay::new(1024)),
            Arc::new(LiveSettings::new(
                ServerSettings::default(),
                Arc::new(MemorySettingsStore::new()),
            )),
            "192.168.0.7".to_string(),
        )
    }

    fn session(loopback: bool, token: Option<String>) -> SessionState {
        let (handle, _rx) = ConsumerHandle::new(Uuid::new_v4());
        SessionState::new(handle, loopback, token)
    }

    #[test]
    fn test_get_ip_prefers_configured_address() {
        // Arrange
        let plane = control_plane();
        let mut s = session(true, None);
        let before = plane.route(&mut s, ClientMessage::GetIp, Instant::now());

        // Act
        plane.settings.update(&json!({"address": "10.9.9.9"})).unwrap();
        let after = plane.route(&mut s, ClientMessage::GetIp, Instant::now());

        // Assert
        assert_eq!(before, Routed::Reply(ServerMessage::ServerIp { ip: "192.168.0.7".into() }));
        assert_eq!(after, Routed::Reply(ServerMessage::ServerIp { ip: "10.9.9.9".into() }));
    }

    #[test]
    fn test_generate_token_only_from_loopback() {
        // Arrange
        let plane = control_plane();
        let mut local = session(true, None);
        let mut remote = session(false, None);

        // Act
        let first = plane.route(&mut local, ClientMessage::GenerateToken, Instant::now());
        let second = plane.route(&mut local, ClientMessage::GenerateToken, Instant::now());
        let refused = plane.route(&mut remote, ClientMessage::GenerateToken, Instant::now());

        // Assert
        assert_eq!(first, second);
        assert!(matches!(first, Routed::Reply(ServerMessage::TokenGenerated { .. })));
        assert!(matches!(refused, Routed::Reply(ServerMessage::AuthError { .. })));
    }

    #[test]
    fn test_messages_touch_token_except_ip_and_token_requests() {
        // Arrange
        let plane = control_plane();
        let token = plane.tokens.issue();
        let created = plane.tokens.get(&token).unwrap().last_touched;
        let mut remote = session(false, Some(token.clone()));
        let later = created + Duration::from_secs(2);

        // Act
        plane.route(&mut remote, ClientMessage::GetIp, later);
        let untouched = plane.tokens.get(&token).unwrap().last_touched;
        plane.route(&mut remote, ClientMessage::Move { dx: 1.0, dy: 0.0 }, later);
        let touched = plane.tokens.get(&token).unwrap().last_touched;

        // Assert
        assert_eq!(untouched, created);
        assert_eq!(touched, later);
    }

    #[test]
    fn test_token_touch_is_rate_limited_per_connection() {
        // Arrange
        let plane = control_plane();
        let token = plane.tokens.issue();
        let created = plane.tokens.get(&token).unwrap().last_touched;
        let mut phone = session(false, Some(token.clone()));
        let mut tablet = session(false, Some(token.clone()));
        let move_msg = || ClientMessage::Move { dx: 1.0, dy: 0.0 };
        let t1 = created + Duration::from_secs(5);
        let t2 = t1 + Duration::from_millis(300);
        let t3 = t1 + Duration::from_millis(600);

        // Act
        plane.route(&mut phone, move_msg(), t1);
        plane.route(&mut phone, move_msg(), t2);
        let after_phone = plane.tokens.get(&token).unwrap().last_touched;
        plane.route(&mut tablet, move_msg(), t3);
        let after_tablet = plane.tokens.get(&token).unwrap().last_touched;

        // Assert: the phone's second message is inside its own window; the
        // tablet has a window of its own
        assert_eq!(after_phone, t1);
        assert_eq!(phone.last_touch, Some(t1));
        assert_eq!(after_tablet, t3);
        assert_eq!(tablet.last_touch, Some(t3));
    }

    #[test]
    fn test_input_messages_become_dispatch_jobs() {
        let plane = control_plane();
        let mut s = session(true, None);
        assert_eq!(
            plane.route(&mut s, ClientMessage::Text { text: "hi".into() }, Instant::now()),
            Routed::Dispatch(DispatchJob::Input(Intent::Text { value: "hi".into() }))
        );
        assert_eq!(
            plane.route(&mut s, ClientMessage::Paste { text: None }, Instant::now()),
            Routed::Dispatch(DispatchJob::Paste(None))
        );
        assert_eq!(
            plane.route(&mut s, ClientMessage::Copy, Instant::now()),
            Routed::Dispatch(DispatchJob::Copy)
        );
    }

    #[test]
    fn test_update_config_reports_validation_errors() {
        let plane = control_plane();
        let mut s = session(true, None);
        let reply = plane.route(
            &mut s,
            ClientMessage::UpdateConfig { config: json!({"inputThrottleMs": 5000}) },
            Instant::now(),
        );
        assert_eq!(
            reply,
            Routed::Reply(ServerMessage::config_failed("Invalid inputThrottleMs (must be 1-1000)"))
        );
    }

    #[test]
    fn test_only_producers_relay_frames() {
        // Arrange
        let plane = control_plane();
        let mut producer = session(true, None);
        let (viewer_handle, mut viewer_rx) = ConsumerHandle::new(Uuid::new_v4());
        let mut viewer = SessionState::new(viewer_handle, true, None);
        plane.route(&mut viewer, ClientMessage::StartMirror, Instant::now());

        // Act
        let ignored = plane.relay_frame(&producer, b"frame");
        plane.route(&mut producer, ClientMessage::StartProvider, Instant::now());
        let relayed = plane.relay_frame(&producer, b"frame");
        plane.disconnect(&viewer);

        // Assert
        assert_eq!(ignored, None);
        assert_eq!(relayed, Some(RelayReport { delivered: 1, skipped: 0 }));
        assert!(viewer_rx.try_recv().is_ok());
        assert_eq!(plane.relay.consumer_count(), 0);
    }
}

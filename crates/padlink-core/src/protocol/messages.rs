//! Message types exchanged between the touch client and the host.
//!
//! Both directions use internally tagged JSON objects:
//!
//! ```text
//! {"type":"move","dx":4.5,"dy":-1.0}
//! {"type":"connected","serverIp":"192.168.1.20"}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::intent::{Intent, MouseButton, SwipeDirection};

// ── Client → host ─────────────────────────────────────────────────────────────

/// Every `type` tag the host accepts from a client.
pub const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "move",
    "click",
    "scroll",
    "zoom",
    "key",
    "text",
    "combo",
    "swipe",
    "copy",
    "paste",
    "start-provider",
    "stop-provider",
    "start-mirror",
    "stop-mirror",
    "get-ip",
    "generate-token",
    "update-config",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Move {
        dx: f64,
        dy: f64,
    },
    Click {
        button: MouseButton,
        press: bool,
    },
    Scroll {
        #[serde(default)]
        dx: f64,
        #[serde(default)]
        dy: f64,
    },
    Zoom {
        delta: f64,
    },
    Key {
        key: String,
    },
    Text {
        text: String,
    },
    Combo {
        keys: Vec<String>,
    },
    Swipe {
        direction: SwipeDirection,
    },
    /// Copy the host selection and send it back as `clipboard-sync`.
    Copy,
    /// Paste on the host, optionally replacing the host clipboard first.
    Paste {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    StartProvider,
    StopProvider,
    StartMirror,
    StopMirror,
    GetIp,
    GenerateToken,
    /// Partial server settings; validated key by key on the host.
    UpdateConfig {
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl ClientMessage {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ClientMessage::Move { .. } => "move",
            ClientMessage::Click { .. } => "click",
            ClientMessage::Scroll { .. } => "scroll",
            ClientMessage::Zoom { .. } => "zoom",
            ClientMessage::Key { .. } => "key",
            ClientMessage::Text { .. } => "text",
            ClientMessage::Combo { .. } => "combo",
            ClientMessage::Swipe { .. } => "swipe",
            ClientMessage::Copy => "copy",
            ClientMessage::Paste { .. } => "paste",
            ClientMessage::StartProvider => "start-provider",
            ClientMessage::StopProvider => "stop-provider",
            ClientMessage::StartMirror => "start-mirror",
            ClientMessage::StopMirror => "stop-mirror",
            ClientMessage::GetIp => "get-ip",
            ClientMessage::GenerateToken => "generate-token",
            ClientMessage::UpdateConfig { .. } => "update-config",
        }
    }

    /// Extracts the input intent carried by this message, if any.
    pub fn into_intent(self) -> Option<Intent> {
        let intent = match self {
            ClientMessage::Move { dx, dy } => Intent::Move { dx, dy },
            ClientMessage::Click { button, press } => Intent::Click {
                button,
                pressed: press,
            },
            ClientMessage::Scroll { dx, dy } => Intent::Scroll { dx, dy },
            ClientMessage::Zoom { delta } => Intent::Zoom { delta },
            ClientMessage::Key { key } => Intent::Key { name: key },
            ClientMessage::Text { text } => Intent::Text { value: text },
            ClientMessage::Combo { keys } => Intent::Combo { keys },
            ClientMessage::Swipe { direction } => Intent::Swipe { direction },
            _ => return None,
        };
        Some(intent)
    }
}

impl From<Intent> for ClientMessage {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Move { dx, dy } => ClientMessage::Move { dx, dy },
            Intent::Scroll { dx, dy } => ClientMessage::Scroll { dx, dy },
            Intent::Zoom { delta } => ClientMessage::Zoom { delta },
            Intent::Click { button, pressed } => ClientMessage::Click {
                button,
                press: pressed,
            },
            Intent::Swipe { direction } => ClientMessage::Swipe { direction },
            Intent::Key { name } => ClientMessage::Key { key: name },
            Intent::Text { value } => ClientMessage::Text { text: value },
            Intent::Combo { keys } => ClientMessage::Combo { keys },
        }
    }
}

// ── Host → client ─────────────────────────────────────────────────────────────

/// Every `type` tag a client accepts from the host.
pub const SERVER_MESSAGE_TYPES: &[&str] = &[
    "connected",
    "server-ip",
    "token-generated",
    "clipboard-sync",
    "config-updated",
    "auth-error",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every accepted connection.
    Connected {
        #[serde(rename = "serverIp")]
        server_ip: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
    },
    ServerIp {
        ip: String,
    },
    TokenGenerated {
        token: String,
    },
    ClipboardSync {
        text: String,
    },
    ConfigUpdated {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AuthError {
        error: String,
    },
}

impl ServerMessage {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::ServerIp { .. } => "server-ip",
            ServerMessage::TokenGenerated { .. } => "token-generated",
            ServerMessage::ClipboardSync { .. } => "clipboard-sync",
            ServerMessage::ConfigUpdated { .. } => "config-updated",
            ServerMessage::AuthError { .. } => "auth-error",
        }
    }

    pub fn config_ok() -> Self {
        ServerMessage::ConfigUpdated {
            success: true,
            error: None,
        }
    }

    pub fn config_failed(error: impl Into<String>) -> Self {
        ServerMessage::ConfigUpdated {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags_match_serialized_tag() {
        let samples = vec![
            ClientMessage::Move { dx: 1.0, dy: 2.0 },
            ClientMessage::Copy,
            ClientMessage::Paste { text: None },
            ClientMessage::StartProvider,
            ClientMessage::GetIp,
            ClientMessage::UpdateConfig {
                config: serde_json::json!({"inputThrottleMs": 16}),
            },
        ];
        for msg in samples {
            let json = serde_json::to_value(&msg).unwrap();
            assert_eq!(json["type"], msg.type_tag());
            assert!(CLIENT_MESSAGE_TYPES.contains(&msg.type_tag()));
        }
    }

    #[test]
    fn test_connected_uses_camel_case_server_ip() {
        // Arrange
        let msg = ServerMessage::Connected {
            server_ip: "10.0.0.7".into(),
            platform: None,
        };

        // Act
        let json = serde_json::to_string(&msg).unwrap();

        // Assert
        assert_eq!(json, r#"{"type":"connected","serverIp":"10.0.0.7"}"#);
    }

    #[test]
    fn test_config_updated_omits_error_on_success() {
        let json = serde_json::to_string(&ServerMessage::config_ok()).unwrap();
        assert_eq!(json, r#"{"type":"config-updated","success":true}"#);
    }

    #[test]
    fn test_click_intent_maps_pressed_to_press() {
        let msg = ClientMessage::from(Intent::Click {
            button: MouseButton::Left,
            pressed: false,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type":"click","button":"left","press":false}));
    }

    #[test]
    fn test_control_messages_carry_no_intent() {
        assert_eq!(ClientMessage::StartMirror.into_intent(), None);
        assert_eq!(ClientMessage::Copy.into_intent(), None);
    }
}

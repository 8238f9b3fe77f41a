//! Client configuration.

use std::time::Duration;

use padlink_core::GestureConfig;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3000/ws";

/// First reconnect delay; doubles per failed attempt.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Ceiling for the reconnect delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Where and how the transport connects.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Full WebSocket URL including the `/ws` path.
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` on the upgrade request.
    pub token: Option<String>,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            token: None,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub gesture: GestureConfig,
}

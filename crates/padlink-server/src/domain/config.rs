//! Server configuration types.
//!
//! [`ServerSettings`] is what gets persisted (TOML on disk) and what a client
//! may change at runtime through `update-config`.  [`ServerConfig`] is the
//! resolved runtime view built once at startup from settings plus CLI
//! overrides.
//!
//! # Serde default values
//!
//! Every persisted field carries a `#[serde(default = "...")]` so a missing or
//! partial settings file still loads, and a file written by an older build
//! picks up new fields with their defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use padlink_core::SwipeDirection;

/// Default listener port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default coalescing window for move and scroll input.
pub const DEFAULT_THROTTLE_MS: u64 = 8;

/// Longest string accepted for `host` or `address`.
pub const MAX_SETTING_LEN: usize = 255;

/// Outbound bytes a mirror consumer may have queued before frames are skipped.
pub const DEFAULT_BACKPRESSURE_BYTES: usize = 1024 * 1024;

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Persisted settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Interface to bind.  `"0.0.0.0"` accepts LAN connections.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listener port.
    #[serde(default = "default_port")]
    pub frontend_port: u16,

    /// Address advertised to clients in `connected` and `server-ip`.
    /// Detected from the default route when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Move/scroll coalescing window in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub input_throttle_ms: u64,

    #[serde(default)]
    pub swipe: SwipeBindings,
}

/// Key chord pressed for each three-finger swipe direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwipeBindings {
    #[serde(default = "default_swipe_left")]
    pub left: Vec<String>,
    #[serde(default = "default_swipe_right")]
    pub right: Vec<String>,
    #[serde(default = "default_swipe_up")]
    pub up: Vec<String>,
    #[serde(default = "default_swipe_down")]
    pub down: Vec<String>,
}

impl SwipeBindings {
    pub fn chord(&self, direction: SwipeDirection) -> &[String] {
        match direction {
            SwipeDirection::Left => &self.left,
            SwipeDirection::Right => &self.right,
            SwipeDirection::Up => &self.up,
            SwipeDirection::Down => &self.down,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}

fn chord(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| (*k).to_string()).collect()
}

fn default_swipe_left() -> Vec<String> {
    chord(&["alt", "arrowleft"])
}

fn default_swipe_right() -> Vec<String> {
    chord(&["alt", "arrowright"])
}

fn default_swipe_up() -> Vec<String> {
    chord(&["meta", "tab"])
}

fn default_swipe_down() -> Vec<String> {
    chord(&["meta", "d"])
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            frontend_port: default_port(),
            address: None,
            input_throttle_ms: default_throttle_ms(),
            swipe: SwipeBindings::default(),
        }
    }
}

impl Default for SwipeBindings {
    fn default() -> Self {
        Self {
            left: default_swipe_left(),
            right: default_swipe_right(),
            up: default_swipe_up(),
            down: default_swipe_down(),
        }
    }
}

impl ServerSettings {
    /// Merges the fields present in `patch`.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(host) = &patch.host {
            self.host = host.clone();
        }
        if let Some(port) = patch.frontend_port {
            self.frontend_port = port;
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(ms) = patch.input_throttle_ms {
            self.input_throttle_ms = ms;
        }
    }
}

// ── Runtime update ────────────────────────────────────────────────────────────

/// Rejection reasons for an `update-config` payload.
///
/// The display strings are sent back verbatim in `config-updated.error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigUpdateError {
    #[error("Invalid config payload")]
    InvalidPayload,
    #[error("Invalid port number (must be 1-65535)")]
    InvalidPort,
    #[error("Invalid inputThrottleMs (must be 1-1000)")]
    InvalidThrottle,
    #[error("No valid config keys provided")]
    NoValidKeys,
}

/// Validated subset of settings a client asked to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub host: Option<String>,
    pub frontend_port: Option<u16>,
    pub address: Option<String>,
    pub input_throttle_ms: Option<u64>,
}

impl ConfigPatch {
    /// Validates a client-supplied JSON object.
    ///
    /// Recognised keys are `host`, `frontendPort`, `address` and
    /// `inputThrottleMs`; everything else is ignored.  Numeric keys accept
    /// numbers or numeric strings.  String keys longer than
    /// [`MAX_SETTING_LEN`] or of the wrong type are skipped rather than
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigUpdateError`] for a non-object payload, an out-of-range
    /// number, or when nothing usable remains.
    pub fn from_json(value: &Value) -> Result<Self, ConfigUpdateError> {
        let object = value.as_object().ok_or(ConfigUpdateError::InvalidPayload)?;
        let mut patch = ConfigPatch::default();

        if let Some(raw) = object.get("frontendPort") {
            let port = numeric(raw)
                .filter(|p| p.is_finite() && p.fract() == 0.0 && (1.0..=65535.0).contains(p))
                .ok_or(ConfigUpdateError::InvalidPort)?;
            patch.frontend_port = Some(port as u16);
        }

        if let Some(raw) = object.get("inputThrottleMs") {
            let ms = numeric(raw)
                .filter(|ms| ms.is_finite() && (1.0..=1000.0).contains(ms))
                .ok_or(ConfigUpdateError::InvalidThrottle)?;
            patch.input_throttle_ms = Some(ms.round() as u64);
        }

        patch.host = bounded_string(object.get("host"));
        patch.address = bounded_string(object.get("address"));

        if patch == ConfigPatch::default() {
            return Err(ConfigUpdateError::NoValidKeys);
        }
        Ok(patch)
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bounded_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| s.chars().count() <= MAX_SETTING_LEN)
        .map(str::to_owned)
}

// ── Runtime config ────────────────────────────────────────────────────────────

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,
    /// Where `update-config` persists settings; `None` keeps changes in memory.
    pub settings_path: Option<PathBuf>,
    /// Per-consumer outbound byte ceiling for screen frames.
    pub backpressure_bytes: usize,
    /// Wait between the copy chord and reading the host clipboard.
    pub copy_settle: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            settings_path: None,
            backpressure_bytes: DEFAULT_BACKPRESSURE_BYTES,
            copy_settle: Duration::from_millis(50),
        }
    }
}

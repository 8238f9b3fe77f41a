//! Infrastructure layer for padlink-server.
//!
//! Everything that touches the outside world: the WebSocket listener, the
//! settings file, network address discovery, and the actuator backends.

pub mod actuator;
pub mod config_store;
pub mod net;
pub mod ws_server;

pub use actuator::{ActuatorCall, RecordingActuator, TracingActuator};
pub use config_store::TomlSettingsStore;
pub use net::{detect_lan_ip, is_loopback};
pub use ws_server::{check_upgrade, run_server, run_server_on, Rejection, ServerState, WS_PATH};

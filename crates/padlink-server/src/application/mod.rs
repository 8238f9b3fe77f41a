//! Application layer for padlink-server.
//!
//! Use cases that know *what* the host does with each message, with traits at
//! the two I/O seams: [`actuator::InputActuator`] for OS input injection and
//! [`settings::SettingsStore`] for persistence.  Nothing here opens a socket
//! or touches the filesystem directly.

pub mod actuator;
pub mod dispatch;
pub mod relay;
pub mod session;
pub mod settings;
pub mod tokens;

pub use actuator::{press_chord, tap_key, ActuatorError, ActuatorQueue, InputActuator, ScrollAxis};
pub use dispatch::{DispatchError, DispatchSettings, InputDispatcher, Throttle};
pub use relay::{ConsumerHandle, Outbound, RelayReport, ScreenRelay};
pub use session::{ControlPlane, DispatchJob, Routed, SessionState};
pub use settings::{LiveSettings, MemorySettingsStore, SettingsStore};
pub use tokens::{AuthToken, TokenAuthority};

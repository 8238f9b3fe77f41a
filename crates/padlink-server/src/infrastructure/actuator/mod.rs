//! Input actuator backends.
//!
//! No OS injection backend is linked into this crate; the binary runs with
//! [`TracingActuator`] and embedders supply their own [`InputActuator`].
//!
//! [`InputActuator`]: crate::application::InputActuator

pub mod recording;
pub mod tracing_log;

pub use recording::{ActuatorCall, RecordingActuator};
pub use tracing_log::TracingActuator;

//! Application layer for the client.
//!
//! - [`backoff`]: reconnect delay schedule.
//! - [`trackpad`]: wires the gesture engine and combo buffer to a message sink.
//! - [`input_script`]: newline-delimited JSON touch events read by the binary.

pub mod backoff;
pub mod input_script;
pub mod trackpad;

pub use backoff::Backoff;
pub use input_script::{parse_event, InputEvent, ScriptError};
pub use trackpad::{MessageSink, Trackpad};

//! # padlink-core
//!
//! Shared library for padlink containing the gesture recognition engine, the
//! modifier combo buffer, the key-name table and the JSON wire protocol.
//!
//! This crate is used by both the host server and the touch client.
//! It has zero dependencies on OS APIs, timers, or network sockets: every
//! time-dependent operation takes the current [`std::time::Instant`] as an
//! argument so callers own the clock.
//!
//! # Architecture overview
//!
//! padlink turns a phone or tablet into a trackpad and keyboard for a host
//! computer.  The touch device samples finger positions, recognises gestures
//! locally, and ships the resulting *intents* to the host over a WebSocket.
//! The host replays them through an input actuator.
//!
//! - **`domain`** – Pure state machines.  [`GestureEngine`] turns contact
//!   samples into [`Intent`]s; [`ComboBuffer`] records modifier chords typed
//!   one key at a time.
//!
//! - **`keymap`** – The canonical key names accepted in `key` and `combo`
//!   messages, resolved to USB HID usage ids.
//!
//! - **`protocol`** – The JSON messages exchanged between client and host,
//!   plus a bounded decoder for untrusted text frames.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::combo::{ComboBuffer, ComboOutcome, ComboState, MAX_COMBO_KEYS};
pub use domain::gesture::{ContactId, ContactSample, GestureConfig, GestureEngine, ReleaseTimer};
pub use domain::intent::{Intent, MouseButton, SwipeDirection};
pub use keymap::{Key, KeyCode};
pub use protocol::codec::{decode_client_message, encode_client_message, encode_server_message, ProtocolError};
pub use protocol::messages::{ClientMessage, ServerMessage};

//! Domain entities for padlink.
//!
//! Everything here is a plain state machine: no sockets, no timers, no OS
//! calls.  Time enters only as `Instant` arguments, which keeps every rule
//! deterministic under test.
//!
//! - [`intent`] – the semantic events that cross the wire.
//! - [`gesture`] – contact tracking and gesture classification.
//! - [`combo`] – the sticky-modifier buffer used by the on-screen keyboard.

pub mod combo;
pub mod gesture;
pub mod intent;

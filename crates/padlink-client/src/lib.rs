//! padlink-client library entry point.
//!
//! The client runs on the touch device.  It recognises gestures locally and
//! ships the resulting intents to the host over a WebSocket that reconnects
//! on its own.
//!
//! ```text
//!  touch samples ──▶ Trackpad ──▶ GestureEngine / ComboBuffer
//!                        │
//!                        ▼ ClientMessage
//!                 TransportChannel ◀──▶ ws://host:3000/ws
//!                        │
//!                        ▼ ServerMessage (per-type subscribers)
//! ```

/// Domain layer: client configuration.
pub mod domain;

/// Application layer: trackpad controller, reconnect backoff, input scripts.
pub mod application;

/// Infrastructure layer: the WebSocket transport.
pub mod infrastructure;

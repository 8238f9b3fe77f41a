//! Infrastructure layer for the client.
//!
//! - [`transport`]: the WebSocket link to the host.  A supervisor task owns the
//!   socket, reconnects with exponential backoff, and fans inbound messages out
//!   to per-type subscribers.

pub mod transport;

pub use transport::{ConnectionState, TransportChannel, TransportError};

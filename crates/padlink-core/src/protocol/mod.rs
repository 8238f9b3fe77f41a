//! Wire protocol: JSON text frames tagged by a `type` field.
//!
//! Binary frames carry screen-mirror payloads and never pass through this
//! module; they are relayed as opaque bytes.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_client_message, decode_server_message, encode_client_message, encode_server_message,
    ProtocolError, MAX_PAYLOAD_BYTES,
};
pub use messages::{ClientMessage, ServerMessage};

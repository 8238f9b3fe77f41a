//! JSON codec for text frames.
//!
//! Decoding is two-stage: the frame is parsed into a generic JSON value, its
//! `type` tag is checked against the known set, and only then is it bound to
//! a typed message.  This lets the host tell an unknown message type (logged
//! and ignored) apart from a known type with bad fields (malformed).

use serde::Serialize;
use thiserror::Error;

use crate::protocol::messages::{
    ClientMessage, ServerMessage, CLIENT_MESSAGE_TYPES, SERVER_MESSAGE_TYPES,
};

/// Largest text frame accepted from a client.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame exceeds [`MAX_PAYLOAD_BYTES`].
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The frame is not valid JSON or a field has the wrong shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The frame is a JSON object without a string `type` field.
    #[error("message has no type tag")]
    MissingType,

    /// The `type` tag is not one this endpoint understands.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("failed to encode message: {0}")]
    Encode(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one client text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] when the frame is oversized, not JSON, untagged,
/// carries an unknown tag, or has fields of the wrong shape.
///
/// # Examples
///
/// ```rust
/// use padlink_core::protocol::{decode_client_message, ClientMessage};
///
/// let msg = decode_client_message(r#"{"type":"zoom","delta":-3}"#).unwrap();
/// assert_eq!(msg, ClientMessage::Zoom { delta: -3.0 });
/// ```
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    if raw.len() > MAX_PAYLOAD_BYTES {
        return Err(ProtocolError::PayloadTooLarge {
            size: raw.len(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    let value = parse_tagged(raw)?;
    let tag = type_tag(&value)?;
    if !CLIENT_MESSAGE_TYPES.contains(&tag) {
        return Err(ProtocolError::UnknownType(tag.to_owned()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Decodes one host text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownType`] for tags this client version does
/// not know, or [`ProtocolError::Malformed`] for bad JSON.
pub fn decode_server_message(raw: &str) -> Result<ServerMessage, ProtocolError> {
    let value = parse_tagged(raw)?;
    let tag = type_tag(&value)?;
    if !SERVER_MESSAGE_TYPES.contains(&tag) {
        return Err(ProtocolError::UnknownType(tag.to_owned()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn parse_tagged(raw: &str) -> Result<serde_json::Value, ProtocolError> {
    serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn type_tag(value: &serde_json::Value) -> Result<&str, ProtocolError> {
    value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)
}

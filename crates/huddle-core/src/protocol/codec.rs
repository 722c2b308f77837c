//! Wire codec for control frames and application payloads.
//!
//! Wire format: a control frame is a JSON object with exactly one entry – a
//! control key mapped to the empty string:
//!
//! ```text
//! {"ping":""}
//! {"pong":""}
//! {"pong-not-received":""}
//! ```
//!
//! Every inbound buffer is run through [`decode_control`] first; a buffer
//! that is not a control frame falls through to application delivery.  The
//! decode is strict (exactly one entry, empty-string value) so an application
//! payload that merely *contains* a `"ping"` key among other fields is never
//! swallowed by the session engine.

use serde::Serialize;
use thiserror::Error;

use crate::protocol::messages::ControlMessage;

/// Errors that can occur while encoding wire frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A control frame could not be serialized.
    #[error("failed to encode control frame: {0}")]
    Control(#[source] serde_json::Error),

    /// An application payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Payload(#[source] serde_json::Error),
}

/// Encodes a control frame as its key-presence JSON object.
///
/// # Errors
///
/// Returns [`CodecError::Control`] if serialization fails.
pub fn encode_control(msg: ControlMessage) -> Result<Vec<u8>, CodecError> {
    let mut object = serde_json::Map::with_capacity(1);
    object.insert(msg.key().to_string(), serde_json::Value::String(String::new()));
    serde_json::to_vec(&serde_json::Value::Object(object)).map_err(CodecError::Control)
}

/// Attempts to decode `bytes` as a control frame.
///
/// Returns `None` – meaning "deliver to the application instead" – unless the
/// buffer is a JSON object with exactly one entry whose key is a control key
/// and whose value is the empty string.
pub fn decode_control(bytes: &[u8]) -> Option<ControlMessage> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let (key, entry) = object.iter().next()?;
    if entry.as_str() != Some("") {
        return None;
    }
    ControlMessage::from_key(key)
}

/// Best-effort JSON parse of an application payload.
///
/// The result accompanies the raw bytes when data is handed to observers, so
/// applications that speak JSON don't parse twice.  Non-JSON payloads simply
/// yield `None`.
pub fn decode_json(bytes: &[u8]) -> Option<serde_json::Value> {
    serde_json::from_slice(bytes).ok()
}

/// Serializes an application payload for sending.
///
/// # Errors
///
/// Returns [`CodecError::Payload`] if serialization fails.  The session
/// engine logs and drops the payload in that case – retrying application
/// data is the caller's policy, not this layer's.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(payload).map_err(CodecError::Payload)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

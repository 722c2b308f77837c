//! Protocol module containing the control-message types and the wire codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_control, decode_json, encode_control, encode_payload, CodecError};
pub use messages::{ControlMessage, DiscoveryRecord};

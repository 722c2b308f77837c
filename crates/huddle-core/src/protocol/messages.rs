//! Control messages and discovery metadata.
//!
//! The protocol is strictly datagram/byte-buffer oriented.  Besides opaque
//! application payloads it defines exactly three control frames, used by the
//! liveness prober:
//!
//! | Frame               | Wire key             | Meaning                                        |
//! |---------------------|----------------------|------------------------------------------------|
//! | `Ping`              | `ping`               | "Are you alive?"                               |
//! | `Pong`              | `pong`               | "I am."                                        |
//! | `PongNotReceived`   | `pong-not-received`  | "You never answered my ping – reset yourself." |
//!
//! Discovery advertisements carry a single key, [`DISCOVERY_ID_KEY`], whose
//! value is this node's identity token.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::peer::{Peer, PeerId};

/// Wire key for [`ControlMessage::Ping`].
pub const CONTROL_KEY_PING: &str = "ping";
/// Wire key for [`ControlMessage::Pong`].
pub const CONTROL_KEY_PONG: &str = "pong";
/// Wire key for [`ControlMessage::PongNotReceived`].
pub const CONTROL_KEY_PONG_NOT_RECEIVED: &str = "pong-not-received";

/// Key under which the identity token travels in discovery advertisements.
pub const DISCOVERY_ID_KEY: &str = "discoveryId";

/// The three internal control frames.  Consumed by the session engine and
/// never forwarded to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Ping,
    Pong,
    PongNotReceived,
}

impl ControlMessage {
    /// The wire key this frame is encoded under.
    pub fn key(self) -> &'static str {
        match self {
            ControlMessage::Ping => CONTROL_KEY_PING,
            ControlMessage::Pong => CONTROL_KEY_PONG,
            ControlMessage::PongNotReceived => CONTROL_KEY_PONG_NOT_RECEIVED,
        }
    }

    /// Resolves a wire key back to a control frame.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            CONTROL_KEY_PING => Some(ControlMessage::Ping),
            CONTROL_KEY_PONG => Some(ControlMessage::Pong),
            CONTROL_KEY_PONG_NOT_RECEIVED => Some(ControlMessage::PongNotReceived),
            _ => None,
        }
    }
}

/// String key/value metadata attached to a discovery advertisement.
///
/// Transports treat the record as opaque; the session engine only ever reads
/// the [`DISCOVERY_ID_KEY`] entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryRecord(HashMap<String, String>);

impl DiscoveryRecord {
    /// Builds the advertisement record for `peer`: a single `discoveryId`
    /// entry carrying the identity token.
    pub fn for_peer(peer: &Peer) -> Self {
        let mut entries = HashMap::with_capacity(1);
        entries.insert(DISCOVERY_ID_KEY.to_string(), peer.id.as_str().to_string());
        Self(entries)
    }

    /// Extracts the advertised identity token, if present.
    pub fn discovery_id(&self) -> Option<PeerId> {
        self.0.get(DISCOVERY_ID_KEY).map(PeerId::new)
    }

    /// Reads an arbitrary entry (for transports that stash extra metadata).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

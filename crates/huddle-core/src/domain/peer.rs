//! Peer identities, endpoint handles, and link states.
//!
//! # Identity vs. address (for beginners)
//!
//! Huddle distinguishes two layers of "who is this":
//!
//! - [`PeerId`] is the *logical* identity: an opaque token generated once per
//!   process/installation and carried in discovery advertisements.  It stays
//!   stable while the same device roams, backgrounds, or is rediscovered.
//!
//! - [`EndpointId`] is the *transport* address: the handle the underlying
//!   network layer uses to reach one discovered endpoint.  One device can
//!   surface under several endpoint handles over time (rediscovery after a
//!   reset, radio roaming), but at most one of them is current.
//!
//! The session engine keeps the mapping between the two and purges stale
//! endpoints when a new one arrives carrying an already-known `PeerId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable logical identity token for one device (the `discoveryId`).
///
/// `PeerId` is totally ordered (lexicographic over the token string).  The
/// ordering is load-bearing: for any discovered pair, only the side with the
/// *smaller* id initiates the connection, so exactly one invite is ever in
/// flight between two devices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Generates a fresh random identity token.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an existing token (e.g. one parsed from a discovery record).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token string, as it appears in discovery advertisements.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One participant as seen by the application: identity plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Stable identity token advertised during discovery.
    pub id: PeerId,
    /// Human-readable name shown in peer lists.
    pub display_name: String,
}

impl Peer {
    /// Creates a peer with a freshly generated random identity.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: PeerId::random(),
            display_name: display_name.into(),
        }
    }

    /// Creates a peer with a caller-supplied identity token.
    pub fn with_id(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Opaque handle the transport layer uses to address one discovered endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of the byte-channel to one endpoint, as last reported by the
/// transport (or recovered by a liveness probe).
///
/// An endpoint with no recorded `LinkState` is *unknown*: either never seen
/// on the session, or deliberately cleared to force a liveness re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A connection attempt is in progress.
    Connecting,
    /// The byte-channel is open.
    Connected,
    /// The transport reported the channel closed or the attempt failed.
    NotConnected,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

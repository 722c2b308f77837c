//! Peer directory: maps transport endpoints to stable peer identities.
//!
//! One device advertises one identity token but can surface under several
//! transport endpoints over time (rediscovery after a reset, radio roaming).
//! At most one endpoint per identity is current: recording a discovery that
//! carries an already-known identity supersedes the older endpoint, and the
//! caller purges the superseded endpoint's connection/invite/probe
//! bookkeeping.
//!
//! Losing an endpoint removes it from the discovered set but keeps the
//! identity association, so later events for that endpoint can still be
//! attributed to a peer (and reported to observers).

use std::collections::{HashMap, HashSet};

use huddle_core::{EndpointId, Peer};

pub(crate) struct PeerDirectory {
    /// Endpoints the transport currently reports in discovery range.
    discovered: HashSet<EndpointId>,
    /// Identity association for every endpoint seen this session generation.
    peers: HashMap<EndpointId, Peer>,
}

impl PeerDirectory {
    pub(crate) fn new() -> Self {
        Self {
            discovered: HashSet::new(),
            peers: HashMap::new(),
        }
    }

    /// Records a discovery of `endpoint` carrying `peer`'s identity.
    ///
    /// Adds the endpoint to the discovered set and returns every *other*
    /// endpoint previously associated with the same identity.  Those are
    /// removed here; the caller must drop their link/invite/probe records to
    /// complete the dedup atomically.
    pub(crate) fn record_discovery(&mut self, endpoint: &EndpointId, peer: Peer) -> Vec<EndpointId> {
        let superseded: Vec<EndpointId> = self
            .peers
            .iter()
            .filter(|(other, known)| *other != endpoint && known.id == peer.id)
            .map(|(other, _)| other.clone())
            .collect();

        for old in &superseded {
            self.discovered.remove(old);
            self.peers.remove(old);
        }

        self.discovered.insert(endpoint.clone());
        self.peers.insert(endpoint.clone(), peer);
        superseded
    }

    /// Marks an endpoint as in discovery range without learning anything new
    /// about its identity (used when a channel connects before the browser
    /// reports the endpoint found).
    pub(crate) fn mark_discovered(&mut self, endpoint: &EndpointId) {
        self.discovered.insert(endpoint.clone());
    }

    /// Removes an endpoint from the discovered set.  The identity association
    /// is kept so the endpoint still resolves.
    pub(crate) fn mark_lost(&mut self, endpoint: &EndpointId) {
        self.discovered.remove(endpoint);
    }

    pub(crate) fn is_discovered(&self, endpoint: &EndpointId) -> bool {
        self.discovered.contains(endpoint)
    }

    /// Resolves an endpoint to the peer identity it last advertised.
    pub(crate) fn resolve(&self, endpoint: &EndpointId) -> Option<&Peer> {
        self.peers.get(endpoint)
    }

    pub(crate) fn clear(&mut self) {
        self.discovered.clear();
        self.peers.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

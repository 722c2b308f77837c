//! The transport seam: what the session engine expects from the underlying
//! local-network layer.
//!
//! The discovery/connection primitive is treated as an abstract capability:
//! advertise presence with opaque metadata, browse for others, open a
//! multiplexed reliable/unreliable byte-channel to a discovered endpoint,
//! and report state changes.  Adapters implement [`Transport`] for the
//! commands and deliver [`TransportEvent`]s to the engine – from any thread
//! or callback context, in any order.

use std::time::Duration;

use async_trait::async_trait;
use huddle_core::{DiscoveryRecord, EndpointId, LinkState};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub mod memory;

/// Errors surfaced by a transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A command was issued before `start` (or after `stop`).
    #[error("transport is not running")]
    NotRunning,

    /// The endpoint is not (or no longer) reachable through this transport.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(EndpointId),

    /// A datagram could not be handed to the network layer.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Advertising or browsing could not be started.
    #[error("failed to start transport: {0}")]
    StartFailed(String),
}

/// Commands the engine issues to the underlying network layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts advertising `record` under `local_name` and browsing for other
    /// nodes on the same service.
    async fn start(&self, local_name: &str, record: DiscoveryRecord) -> Result<(), TransportError>;

    /// Stops advertising and browsing and tears down every open channel.
    async fn stop(&self);

    /// Asks `endpoint` to open a channel with us.  The transport keeps the
    /// request outstanding for at most `timeout`.
    async fn invite(&self, endpoint: &EndpointId, timeout: Duration) -> Result<(), TransportError>;

    /// Answers an [`TransportEvent::InviteReceived`].  A rejection must be
    /// delivered to the requester (its retry logic depends on observing it),
    /// not silently dropped.
    async fn respond(&self, endpoint: &EndpointId, accept: bool) -> Result<(), TransportError>;

    /// Sends one datagram to each endpoint in `to`.  `reliable` selects the
    /// ordered/retransmitting mode where the transport distinguishes.
    async fn send(
        &self,
        to: &[EndpointId],
        data: &[u8],
        reliable: bool,
    ) -> Result<(), TransportError>;

    /// Whether the transport itself currently holds an open channel to
    /// `endpoint`.  This is the transport's own view, which can disagree
    /// with the engine's (that disagreement is what liveness probes are for).
    fn is_channel_open(&self, endpoint: &EndpointId) -> bool;
}

/// Everything a transport adapter reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Browsing found an endpoint advertising `record`.
    EndpointFound {
        endpoint: EndpointId,
        display_name: String,
        record: DiscoveryRecord,
    },
    /// A previously found endpoint left discovery range.
    EndpointLost { endpoint: EndpointId },
    /// The channel to `endpoint` changed state.
    StateChanged {
        endpoint: EndpointId,
        state: LinkState,
    },
    /// `endpoint` asked to open a channel with us; answer with
    /// [`Transport::respond`].
    InviteReceived { endpoint: EndpointId },
    /// A datagram arrived from `endpoint`.
    DataReceived { endpoint: EndpointId, data: Vec<u8> },
    /// The adapter surfaced a capability this protocol does not speak
    /// (a stream, a resource transfer).  Fatal for the session.
    UnsupportedCapability {
        endpoint: EndpointId,
        capability: String,
    },
}

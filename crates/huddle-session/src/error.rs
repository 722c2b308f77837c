//! Error types for the session engine.

use huddle_core::EndpointId;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the session engine.
///
/// Transient send failures are deliberately NOT represented here: the engine
/// logs and drops them, and retry policy for application data belongs to the
/// caller.  Unreachable peers and remote liveness verdicts escalate to a
/// session reset internally rather than returning an error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport surfaced a capability this protocol does not speak
    /// (streams, resource transfers).  The protocol is strictly
    /// datagram/byte-buffer oriented, so this is fatal.
    #[error("unsupported transport capability `{capability}` from {endpoint}; this protocol is datagram-only")]
    UnsupportedCapability {
        endpoint: EndpointId,
        capability: String,
    },

    /// The underlying transport failed to start advertising/browsing.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

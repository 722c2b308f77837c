//! Construction-time configuration for a session engine.
//!
//! Every tunable lives here and is passed in when the engine is built – there
//! is no process-wide mutable configuration.  The defaults match the protocol
//! constants the retry and liveness logic were designed around.

use std::time::Duration;

/// Tunables for one session engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name of the discovery channel.  Only nodes advertising on the same
    /// channel see each other.
    pub service_name: String,
    /// Maximum number of simultaneously connected peers.  Incoming connection
    /// requests beyond this are explicitly rejected.
    pub max_peer_count: usize,
    /// Wait between invite attempts to the same endpoint.
    pub retry_wait: Duration,
    /// Invite attempts per endpoint before escalating to a session reset.
    pub max_retries: u32,
    /// How long the transport keeps a single invite outstanding.
    pub invite_timeout: Duration,
    /// How long to wait for a `pong` after sending a liveness `ping`.
    pub probe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_name: "huddle".to_string(),
            max_peer_count: 4,
            retry_wait: Duration::from_secs(3),
            max_retries: 3,
            invite_timeout: Duration::from_secs(8),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing_constants() {
        // Arrange / Act
        let cfg = SessionConfig::default();

        // Assert – these values are part of the protocol contract; changing
        // them alters the retry timeline every peer on the network expects.
        assert_eq!(cfg.retry_wait, Duration::from_secs(3));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.invite_timeout, Duration::from_secs(8));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_default_capacity_is_four_peers() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.max_peer_count, 4);
    }
}

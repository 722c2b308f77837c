//! Liveness probing: application-level ping/pong over the transport.
//!
//! Transports can keep reporting a channel as connected long after the
//! device on the other end stopped responding (backgrounded app, half-open
//! link).  A probe sends a `ping` and arms a single-shot timer: if no `pong`
//! arrives within `probe_timeout`, the prober sends `pong-not-received` to
//! the silent endpoint – telling the *remote* that it looks broken from
//! here.  This node never disconnects anyone locally; the peer receiving
//! `pong-not-received` is the one that resets.
//!
//! Symmetrically, receiving `pong-not-received` means the remote pinged us
//! and our pong never made it back: our own session is the broken one, and
//! the only recovery is a full reset.

use huddle_core::{ControlMessage, EndpointId, LinkState};
use tracing::{debug, warn};

use crate::engine::Session;
use crate::timer::TimerHandle;

/// An outstanding ping awaiting its pong.  Dropping the record cancels the
/// expiry timer.
pub(crate) struct ProbeRecord {
    timer: TimerHandle,
}

impl ProbeRecord {
    pub(crate) fn new(timer: TimerHandle) -> Self {
        Self { timer }
    }

    /// Consumes the record without aborting the timer task (used by the
    /// expiry task itself when it removes its own record).
    pub(crate) fn detach(self) {
        self.timer.detach();
    }
}

impl Session {
    /// Sends a `ping` to `endpoint` and arms the expiry timer.
    ///
    /// Started opportunistically when an endpoint shows up with an open
    /// channel but no recorded link state – a connection that never went
    /// through the invite handshake that would otherwise have confirmed it.
    pub(crate) async fn start_probe(&self, endpoint: &EndpointId) {
        debug!("sending liveness ping to {endpoint}");
        let generation = self.generation();
        let me = self.weak_self();
        let target = endpoint.clone();
        let timeout = self.config().probe_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(session) = me.upgrade() else { return };
            session.on_probe_timeout(&target, generation).await;
        });
        {
            let mut state = self.lock_state();
            state
                .probes
                .insert(endpoint.clone(), ProbeRecord::new(TimerHandle::new(task)));
        }
        self.send_control(endpoint, ControlMessage::Ping).await;
    }

    /// Expiry path: the pong never came.  Tell the silent endpoint it looks
    /// broken; do NOT drop it locally – the reset decision is delegated to
    /// the peer receiving the message.
    pub(crate) async fn on_probe_timeout(&self, endpoint: &EndpointId, generation: u64) {
        if self.generation() != generation {
            return;
        }
        let outstanding = {
            let mut state = self.lock_state();
            match state.probes.remove(endpoint) {
                Some(record) => {
                    // This task is the armed timer; detach instead of
                    // aborting ourselves before the send below.
                    record.detach();
                    true
                }
                None => false,
            }
        };
        if !outstanding {
            return;
        }
        warn!(
            "no pong from {endpoint} within {:?}; asking it to reset",
            self.config().probe_timeout
        );
        self.send_control(endpoint, ControlMessage::PongNotReceived)
            .await;
    }

    /// Handles an inbound control frame.  Control frames are consumed here
    /// and never forwarded to observers.
    pub(crate) async fn handle_control(&self, endpoint: &EndpointId, msg: ControlMessage) {
        match msg {
            ControlMessage::Ping => {
                debug!("ping from {endpoint}; answering with pong");
                self.send_control(endpoint, ControlMessage::Pong).await;
            }
            ControlMessage::Pong => {
                debug!("pong from {endpoint}");
                let updated = {
                    let mut state = self.lock_state();
                    // A pong proves the channel is alive even if the
                    // transport never delivered an explicit state change.
                    state
                        .links
                        .entry(endpoint.clone())
                        .or_insert(LinkState::Connected);
                    state.probes.remove(endpoint);
                    state.directory.resolve(endpoint).cloned()
                };
                if let Some(peer) = updated {
                    self.notify_peer_updated(&peer);
                }
            }
            ControlMessage::PongNotReceived => {
                warn!("{endpoint} pinged us and never saw a pong back; resetting session");
                self.reset().await;
            }
        }
    }
}

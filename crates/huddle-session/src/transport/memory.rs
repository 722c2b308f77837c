//! In-memory transport for tests and demos.
//!
//! A [`MemoryHub`] plays the role of the local network: nodes created on the
//! same hub discover each other when started, invites and datagrams are
//! routed between them, and stopping a node makes it vanish from the others'
//! view.  Semantics deliberately mirror the quirks the engine is built to
//! handle:
//!
//! - Every `start` assigns a **fresh** endpoint handle (`name#seq`), so a
//!   node that resets reappears under a new endpoint carrying the same
//!   identity – exercising the dedup path.
//! - An invite to a node whose events nobody consumes simply goes nowhere,
//!   exercising the retry ladder.
//! - The hub records every invite in a log that tests can assert against
//!   (e.g. the tie-break property: only one side ever invites).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huddle_core::{DiscoveryRecord, EndpointId, LinkState};
use tokio::sync::mpsc;

use super::{Transport, TransportError, TransportEvent};

/// The simulated local network.
pub struct MemoryHub {
    state: Mutex<HubState>,
}

struct HubState {
    next_endpoint_seq: u64,
    nodes: Vec<NodeSlot>,
    invite_log: Vec<(EndpointId, EndpointId)>,
}

struct NodeSlot {
    name: String,
    record: DiscoveryRecord,
    running: bool,
    endpoint: Option<EndpointId>,
    events: mpsc::UnboundedSender<TransportEvent>,
    /// Endpoints this node currently holds an open channel to.
    channels: HashSet<EndpointId>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState {
                next_endpoint_seq: 0,
                nodes: Vec::new(),
                invite_log: Vec::new(),
            }),
        })
    }

    /// Registers a new node and returns its transport plus the event stream
    /// the engine should pump.
    pub fn create_node(
        self: &Arc<Self>,
    ) -> (Arc<MemoryTransport>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let index = {
            let mut state = self.lock();
            state.nodes.push(NodeSlot {
                name: String::new(),
                record: DiscoveryRecord::default(),
                running: false,
                endpoint: None,
                events: tx,
                channels: HashSet::new(),
            });
            state.nodes.len() - 1
        };
        (
            Arc::new(MemoryTransport {
                hub: Arc::clone(self),
                index,
            }),
            rx,
        )
    }

    /// Every invite routed through the hub, as `(from, to)` endpoint pairs.
    pub fn invite_log(&self) -> Vec<(EndpointId, EndpointId)> {
        self.lock().invite_log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().expect("hub lock poisoned")
    }
}

impl HubState {
    fn node_index_by_endpoint(&self, endpoint: &EndpointId) -> Option<usize> {
        self.nodes
            .iter()
            .position(|slot| slot.running && slot.endpoint.as_ref() == Some(endpoint))
    }

    fn deliver(&self, index: usize, event: TransportEvent) {
        // A dropped receiver just means nobody is listening on that node.
        let _ = self.nodes[index].events.send(event);
    }
}

/// One node's command surface on a [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    index: usize,
}

impl MemoryTransport {
    /// The endpoint handle assigned by the most recent `start`, if running.
    pub fn current_endpoint(&self) -> Option<EndpointId> {
        self.hub.lock().nodes[self.index].endpoint.clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn start(&self, local_name: &str, record: DiscoveryRecord) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        state.next_endpoint_seq += 1;
        let endpoint = EndpointId::new(format!("{local_name}#{}", state.next_endpoint_seq));

        {
            let slot = &mut state.nodes[self.index];
            slot.name = local_name.to_string();
            slot.record = record;
            slot.running = true;
            slot.endpoint = Some(endpoint.clone());
            slot.channels.clear();
        }

        // Mutual discovery with every other running node.
        for other in 0..state.nodes.len() {
            if other == self.index || !state.nodes[other].running {
                continue;
            }
            let other_slot = &state.nodes[other];
            let (Some(other_endpoint), other_name, other_record) = (
                other_slot.endpoint.clone(),
                other_slot.name.clone(),
                other_slot.record.clone(),
            ) else {
                continue;
            };
            state.deliver(
                other,
                TransportEvent::EndpointFound {
                    endpoint: endpoint.clone(),
                    display_name: local_name.to_string(),
                    record: state.nodes[self.index].record.clone(),
                },
            );
            state.deliver(
                self.index,
                TransportEvent::EndpointFound {
                    endpoint: other_endpoint,
                    display_name: other_name,
                    record: other_record,
                },
            );
        }
        Ok(())
    }

    async fn stop(&self) {
        let mut state = self.hub.lock();
        let Some(endpoint) = state.nodes[self.index].endpoint.take() else {
            return;
        };
        state.nodes[self.index].running = false;
        state.nodes[self.index].channels.clear();

        for other in 0..state.nodes.len() {
            if other == self.index || !state.nodes[other].running {
                continue;
            }
            if state.nodes[other].channels.remove(&endpoint) {
                state.deliver(
                    other,
                    TransportEvent::StateChanged {
                        endpoint: endpoint.clone(),
                        state: LinkState::NotConnected,
                    },
                );
            }
            state.deliver(
                other,
                TransportEvent::EndpointLost {
                    endpoint: endpoint.clone(),
                },
            );
        }
    }

    async fn invite(&self, endpoint: &EndpointId, _timeout: Duration) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        let Some(my_endpoint) = state.nodes[self.index].endpoint.clone() else {
            return Err(TransportError::NotRunning);
        };
        let Some(target) = state.node_index_by_endpoint(endpoint) else {
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        };
        state.invite_log.push((my_endpoint.clone(), endpoint.clone()));
        state.deliver(
            target,
            TransportEvent::InviteReceived {
                endpoint: my_endpoint,
            },
        );
        Ok(())
    }

    async fn respond(&self, endpoint: &EndpointId, accept: bool) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        let Some(my_endpoint) = state.nodes[self.index].endpoint.clone() else {
            return Err(TransportError::NotRunning);
        };
        let Some(inviter) = state.node_index_by_endpoint(endpoint) else {
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        };

        if !accept {
            state.deliver(
                inviter,
                TransportEvent::StateChanged {
                    endpoint: my_endpoint,
                    state: LinkState::NotConnected,
                },
            );
            return Ok(());
        }

        state.nodes[self.index].channels.insert(endpoint.clone());
        state.nodes[inviter].channels.insert(my_endpoint.clone());

        for link in [LinkState::Connecting, LinkState::Connected] {
            state.deliver(
                inviter,
                TransportEvent::StateChanged {
                    endpoint: my_endpoint.clone(),
                    state: link,
                },
            );
            state.deliver(
                self.index,
                TransportEvent::StateChanged {
                    endpoint: endpoint.clone(),
                    state: link,
                },
            );
        }
        Ok(())
    }

    async fn send(
        &self,
        to: &[EndpointId],
        data: &[u8],
        _reliable: bool,
    ) -> Result<(), TransportError> {
        let state = self.hub.lock();
        let Some(my_endpoint) = state.nodes[self.index].endpoint.clone() else {
            return Err(TransportError::NotRunning);
        };

        let mut unreachable = Vec::new();
        for target in to {
            let open = state.nodes[self.index].channels.contains(target);
            match (open, state.node_index_by_endpoint(target)) {
                (true, Some(index)) => state.deliver(
                    index,
                    TransportEvent::DataReceived {
                        endpoint: my_endpoint.clone(),
                        data: data.to_vec(),
                    },
                ),
                _ => unreachable.push(target.clone()),
            }
        }

        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(TransportError::SendFailed(format!(
                "no open channel to {unreachable:?}"
            )))
        }
    }

    fn is_channel_open(&self, endpoint: &EndpointId) -> bool {
        self.hub.lock().nodes[self.index].channels.contains(endpoint)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

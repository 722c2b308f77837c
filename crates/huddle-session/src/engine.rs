//! The session engine: owns all shared peer state and turns raw transport
//! events into a consistent peer view.
//!
//! # Concurrency model (for beginners)
//!
//! Transport callbacks arrive from arbitrary threads and task contexts –
//! discovery found/lost, channel state changes, inbound datagrams – and
//! retry/probe timers fire concurrently with all of them, in no guaranteed
//! order.  Every mutation of shared state happens inside one short critical
//! section guarded by a single `std::sync::Mutex`.  The critical section
//! never performs I/O and is never held across an `.await`: handlers decide
//! *what* to do under the lock, release it, and then talk to the transport.
//!
//! Timers are the only intentional delays.  Each scheduled retry or probe
//! carries the session *generation* captured when it was armed; `reset`
//! bumps the generation before anything else, so a stale timer that fires
//! after a reset observes the mismatch and does nothing.  Purging a record
//! aborts its timer outright (abort-on-drop handles), making the generation
//! check a backstop rather than the primary cancellation path.
//!
//! # The connected-peer invariant
//!
//! An endpoint counts as a connected peer only when it is in the discovered
//! set **and** its link state is `Connected`.  Transports happily keep
//! reporting a backgrounded device's channel as open; the conjunction keeps
//! such ghosts out of [`Session::connected_peers`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use huddle_core::{
    decode_control, decode_json, encode_control, encode_payload, ControlMessage, DiscoveryRecord,
    EndpointId, LinkState, Peer, SessionConfig,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::directory::PeerDirectory;
use crate::error::SessionError;
use crate::invite::InviteRecord;
use crate::observer::{ObserverId, ObserverRegistry, SessionObserver};
use crate::probe::ProbeRecord;
use crate::transport::{Transport, TransportEvent};

/// All shared, lock-protected session state.  Exclusively owned by
/// [`Session`]; no other component holds references into it.
pub(crate) struct SessionState {
    pub(crate) directory: PeerDirectory,
    pub(crate) links: HashMap<EndpointId, LinkState>,
    pub(crate) invites: HashMap<EndpointId, InviteRecord>,
    pub(crate) probes: HashMap<EndpointId, ProbeRecord>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            directory: PeerDirectory::new(),
            links: HashMap::new(),
            invites: HashMap::new(),
            probes: HashMap::new(),
        }
    }

    /// Endpoints that currently count as connected peers: in the discovered
    /// set AND with a connected link.
    pub(crate) fn connected_endpoints(&self) -> Vec<EndpointId> {
        self.links
            .iter()
            .filter(|(endpoint, state)| {
                **state == LinkState::Connected && self.directory.is_discovered(endpoint)
            })
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    /// Discards everything.  Dropping the invite/probe records aborts their
    /// outstanding timers.
    fn clear(&mut self) {
        self.directory.clear();
        self.links.clear();
        self.invites.clear();
        self.probes.clear();
    }
}

/// The session engine.  Construct with [`Session::new`], feed it transport
/// events, and read the peer view through [`Session::connected_peers`].
pub struct Session {
    me: Weak<Session>,
    local_peer: Peer,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    observers: Mutex<ObserverRegistry>,
    /// Bumped on every reset; timers armed under an older generation no-op.
    generation: AtomicU64,
    /// Coalesces overlapping reset requests into one teardown/restart.
    reset_in_flight: AtomicBool,
}

impl Session {
    /// Creates an engine for `local_peer` over `transport`.
    ///
    /// The identity in `local_peer` is used verbatim; the engine never
    /// regenerates it (not even on reset – identity changes are supplied by
    /// the caller constructing a new session).
    pub fn new(
        local_peer: Peer,
        config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            local_peer,
            config,
            transport,
            state: Mutex::new(SessionState::new()),
            observers: Mutex::new(ObserverRegistry::new()),
            generation: AtomicU64::new(0),
            reset_in_flight: AtomicBool::new(false),
        })
    }

    /// This node's own peer identity.
    pub fn local_peer(&self) -> &Peer {
        &self.local_peer
    }

    /// The configuration the engine was constructed with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts advertising and browsing.
    ///
    /// # Errors
    ///
    /// Propagates the transport's start failure.
    pub async fn start(&self) -> Result<(), SessionError> {
        let record = DiscoveryRecord::for_peer(&self.local_peer);
        self.transport
            .start(&self.local_peer.display_name, record)
            .await?;
        info!(
            "session started as \"{}\" ({})",
            self.local_peer.display_name, self.local_peer.id
        );
        self.notify_peer_updated(&self.local_peer);
        Ok(())
    }

    /// Tears the session down: invalidates timers, discards all state, and
    /// stops the transport.
    pub async fn stop(&self) {
        info!("session stopping");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock_state().clear();
        self.transport.stop().await;
    }

    /// Spawns a task that pumps `rx` into [`Session::handle_event`].
    ///
    /// The pump holds only a weak reference; it ends when the session is
    /// dropped, the channel closes, or a fatal protocol violation occurs.
    pub fn spawn_event_pump(
        &self,
        mut rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let me = self.me.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(session) = me.upgrade() else { break };
                if let Err(e) = session.handle_event(event).await {
                    error!("fatal session error: {e}");
                    break;
                }
            }
        })
    }

    /// Applies one transport event.  Safe to call from any task; events may
    /// arrive in any order.
    ///
    /// # Errors
    ///
    /// Only a protocol violation ([`SessionError::UnsupportedCapability`])
    /// is an error; everything else is absorbed into state and logging.
    pub async fn handle_event(&self, event: TransportEvent) -> Result<(), SessionError> {
        match event {
            TransportEvent::EndpointFound {
                endpoint,
                display_name,
                record,
            } => {
                self.on_endpoint_found(endpoint, display_name, record).await;
                Ok(())
            }
            TransportEvent::EndpointLost { endpoint } => {
                self.on_endpoint_lost(endpoint).await;
                Ok(())
            }
            TransportEvent::StateChanged { endpoint, state } => {
                self.on_state_changed(endpoint, state).await;
                Ok(())
            }
            TransportEvent::InviteReceived { endpoint } => {
                self.on_invite_received(endpoint).await;
                Ok(())
            }
            TransportEvent::DataReceived { endpoint, data } => {
                self.on_data_received(endpoint, data).await;
                Ok(())
            }
            TransportEvent::UnsupportedCapability {
                endpoint,
                capability,
            } => Err(SessionError::UnsupportedCapability {
                endpoint,
                capability,
            }),
        }
    }

    /// Snapshot of the peers that are discovered AND connected, resolved to
    /// their identities.  Taken under the state lock at one point in time.
    pub fn connected_peers(&self) -> Vec<Peer> {
        let state = self.lock_state();
        state
            .connected_endpoints()
            .iter()
            .filter_map(|endpoint| state.directory.resolve(endpoint).cloned())
            .collect()
    }

    /// Last recorded link state for `endpoint` (`None` = unknown).
    pub fn link_state(&self, endpoint: &EndpointId) -> Option<LinkState> {
        self.lock_state().links.get(endpoint).copied()
    }

    /// Serializes `payload` and sends it.  An empty `to` broadcasts to all
    /// currently connected peers.  A serialization failure is logged and the
    /// payload dropped – retrying application data is the caller's policy.
    pub async fn send<T: Serialize>(&self, payload: &T, to: &[EndpointId], reliable: bool) {
        match encode_payload(payload) {
            Ok(bytes) => self.send_bytes(&bytes, to, reliable).await,
            Err(e) => error!("could not encode payload: {e}"),
        }
    }

    /// Sends raw bytes.  An empty `to` broadcasts to all currently connected
    /// peers; with zero connected peers this is a no-op (no adapter call).
    pub async fn send_bytes(&self, data: &[u8], to: &[EndpointId], reliable: bool) {
        let targets: Vec<EndpointId> = if to.is_empty() {
            self.lock_state().connected_endpoints()
        } else {
            to.to_vec()
        };
        if targets.is_empty() {
            return;
        }
        if let Err(e) = self.transport.send(&targets, data, reliable).await {
            error!("error sending data to peers: {e}");
        }
    }

    /// Discards all peer/invite/probe state, tears down the transport, and
    /// restarts discovery.  The single recovery primitive: every escalation
    /// path funnels here, and overlapping calls coalesce into one cycle.
    ///
    /// The generation bump comes first so that no stale timer can mutate
    /// state belonging to the next session generation.
    pub async fn reset(&self) {
        if self
            .reset_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("reset already in flight; coalescing");
            return;
        }
        info!("resetting session");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock_state().clear();
        self.transport.stop().await;
        let record = DiscoveryRecord::for_peer(&self.local_peer);
        if let Err(e) = self
            .transport
            .start(&self.local_peer.display_name, record)
            .await
        {
            error!("failed to restart discovery after reset: {e}");
        }
        self.reset_in_flight.store(false, Ordering::SeqCst);
        self.notify_peer_updated(&self.local_peer);
    }

    // ── Observer management ──────────────────────────────────────────────────

    /// Registers an observer; returns the handle for deregistration.
    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) -> ObserverId {
        self.lock_observers().add(observer)
    }

    /// Deregisters an observer.  Returns `false` if already removed.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.lock_observers().remove(id)
    }

    pub(crate) fn notify_peer_updated(&self, peer: &Peer) {
        // Snapshot first: callbacks run without the registry lock held, so
        // an observer may add/remove observers from inside the callback.
        let observers = self.lock_observers().snapshot();
        for observer in observers {
            observer.on_peer_updated(peer);
        }
    }

    fn observers_approve(&self, endpoint: &EndpointId) -> bool {
        let observers = self.lock_observers().snapshot();
        observers
            .iter()
            .all(|observer| observer.should_accept(endpoint))
    }

    // ── Event handlers ───────────────────────────────────────────────────────

    async fn on_endpoint_found(
        &self,
        endpoint: EndpointId,
        display_name: String,
        record: DiscoveryRecord,
    ) {
        let Some(discovery_id) = record.discovery_id() else {
            debug!("found {endpoint} without a discovery id; ignoring");
            return;
        };
        if discovery_id == self.local_peer.id {
            // Our own advertisement reflected back by the browser.
            return;
        }
        info!("found {endpoint} (\"{display_name}\", id {discovery_id})");
        let peer = Peer::with_id(discovery_id, display_name);

        let (probe_needed, invite_step, updated) = {
            let mut state = self.lock_state();
            let superseded = state.directory.record_discovery(&endpoint, peer);
            for old in &superseded {
                // Same device under a new endpoint: the old endpoint's
                // bookkeeping – and its timers – go away with it.
                debug!("{old} superseded by {endpoint}");
                state.links.remove(old);
                state.invites.remove(old);
                state.probes.remove(old);
            }
            let probe_needed = !state.links.contains_key(&endpoint)
                && !state.probes.contains_key(&endpoint)
                && self.transport.is_channel_open(&endpoint);
            let invite_step = self.invite_step_locked(&mut state, &endpoint);
            let updated = state.directory.resolve(&endpoint).cloned();
            (probe_needed, invite_step, updated)
        };

        if probe_needed {
            // The channel is open but we never saw it connect – probe it
            // rather than trusting the transport's word.
            self.start_probe(&endpoint).await;
        }
        self.apply_invite_step(&endpoint, invite_step).await;
        if let Some(peer) = updated {
            self.notify_peer_updated(&peer);
        }
    }

    async fn on_endpoint_lost(&self, endpoint: EndpointId) {
        info!("lost {endpoint}");
        let updated = {
            let mut state = self.lock_state();
            state.directory.mark_lost(&endpoint);
            // Transports can report "lost" while the channel still looks
            // open (device backgrounded).  Clearing the link state forces a
            // liveness re-check instead of an immediate drop.
            state.links.remove(&endpoint);
            state.probes.remove(&endpoint);
            if let Some(record) = state.invites.get_mut(&endpoint) {
                // Cancel the scheduled retry but keep the attempt history –
                // it governs the timing of any future invite to this peer.
                record.retry_scheduled = false;
                record.retry_task = None;
            }
            state.directory.resolve(&endpoint).cloned()
        };
        if let Some(peer) = updated {
            self.notify_peer_updated(&peer);
        }
    }

    async fn on_state_changed(&self, endpoint: EndpointId, link: LinkState) {
        debug!("link to {endpoint} changed to {link:?}");
        let (invite_step, updated) = {
            let mut state = self.lock_state();
            state.links.insert(endpoint.clone(), link);
            let mut invite_step = None;
            match link {
                LinkState::Connected => {
                    // A channel can connect before the browser reports the
                    // endpoint found; count it as discovered either way.
                    state.directory.mark_discovered(&endpoint);
                    state.invites.remove(&endpoint);
                    state.probes.remove(&endpoint);
                }
                LinkState::Connecting => {}
                LinkState::NotConnected => {
                    invite_step = self.invite_step_locked(&mut state, &endpoint);
                }
            }
            (invite_step, state.directory.resolve(&endpoint).cloned())
        };
        self.apply_invite_step(&endpoint, invite_step).await;
        if let Some(peer) = updated {
            self.notify_peer_updated(&peer);
        }
    }

    async fn on_invite_received(&self, endpoint: EndpointId) {
        let state_allows = {
            let state = self.lock_state();
            let already_linked = matches!(
                state.links.get(&endpoint),
                Some(LinkState::Connecting | LinkState::Connected)
            ) || self.transport.is_channel_open(&endpoint);
            let below_capacity = state.connected_endpoints().len() < self.config.max_peer_count;
            !already_linked && below_capacity
        };
        let accept = state_allows && self.observers_approve(&endpoint);

        if accept {
            info!("accepting connection request from {endpoint}");
        } else {
            // Rejected explicitly, never dropped: the requester's retry
            // logic needs to observe the refusal.
            info!("rejecting connection request from {endpoint} (capacity or admission policy)");
        }
        if let Err(e) = self.transport.respond(&endpoint, accept).await {
            warn!("failed to respond to {endpoint}: {e}");
        }
    }

    async fn on_data_received(&self, endpoint: EndpointId, data: Vec<u8>) {
        if let Some(control) = decode_control(&data) {
            self.handle_control(&endpoint, control).await;
            return;
        }
        let parsed = decode_json(&data);
        let observers = self.lock_observers().snapshot();
        for observer in observers {
            observer.on_data_received(&data, parsed.as_ref(), &endpoint);
        }
    }

    // ── Internal plumbing shared with the invite/probe modules ───────────────

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }

    fn lock_observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().expect("observer lock poisoned")
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn weak_self(&self) -> Weak<Session> {
        self.me.clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Encodes and sends one control frame; failures are logged and dropped.
    pub(crate) async fn send_control(&self, endpoint: &EndpointId, msg: ControlMessage) {
        let bytes = match encode_control(msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("could not encode control frame: {e}");
                return;
            }
        };
        if let Err(e) = self
            .transport
            .send(std::slice::from_ref(endpoint), &bytes, true)
            .await
        {
            warn!("failed to send {msg:?} to {endpoint}: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

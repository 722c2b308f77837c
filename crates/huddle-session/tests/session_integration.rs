//! Integration tests driving complete session engines against each other
//! over the in-memory transport.
//!
//! These exercise the engine the way an application uses it: construct a
//! session per node, pump its transport events, and observe the public peer
//! view.  The paused Tokio clock makes the retry/probe timelines exact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use huddle_core::{EndpointId, Peer, PeerId, SessionConfig};
use huddle_session::{MemoryHub, MemoryTransport, Session, SessionObserver, Transport};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct RecordingObserver {
    data: Mutex<Vec<(Vec<u8>, Option<serde_json::Value>, EndpointId)>>,
}

impl RecordingObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(Vec::new()),
        })
    }

    fn data(&self) -> Vec<(Vec<u8>, Option<serde_json::Value>, EndpointId)> {
        self.data.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_peer_updated(&self, _peer: &Peer) {}

    fn on_data_received(
        &self,
        data: &[u8],
        parsed: Option<&serde_json::Value>,
        from: &EndpointId,
    ) {
        self.data
            .lock()
            .unwrap()
            .push((data.to_vec(), parsed.cloned(), from.clone()));
    }
}

/// Builds a session on `hub` for the given identity and starts pumping its
/// transport events.
async fn spawn_node(
    hub: &Arc<MemoryHub>,
    id: &str,
    config: SessionConfig,
) -> (Arc<Session>, Arc<MemoryTransport>) {
    let (transport, rx) = hub.create_node();
    let session = Session::new(
        Peer::with_id(PeerId::new(id), format!("node-{id}")),
        config,
        Arc::clone(&transport) as Arc<dyn huddle_session::Transport>,
    );
    session.spawn_event_pump(rx);
    session.start().await.expect("start");
    (session, transport)
}

/// Lets queued events and ready tasks drain without advancing time.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// Identities "A1" and "B2" discover each other; only "A1" invites; after
/// acceptance both report one connected peer.
#[tokio::test(start_paused = true)]
async fn test_only_the_lower_identity_invites_and_both_connect() {
    let hub = MemoryHub::new();
    let (alice, alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;
    let (bob, _bob_transport) = spawn_node(&hub, "B2", SessionConfig::default()).await;
    settle().await;

    // Both sides report exactly one connected peer, and it is the other one.
    let alice_view = alice.connected_peers();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view[0].id, PeerId::new("B2"));

    let bob_view = bob.connected_peers();
    assert_eq!(bob_view.len(), 1);
    assert_eq!(bob_view[0].id, PeerId::new("A1"));

    // Every invite on the wire came from Alice's endpoint.
    let alice_endpoint = alice_transport.current_endpoint().unwrap();
    let log = hub.invite_log();
    assert!(!log.is_empty());
    assert!(
        log.iter().all(|(from, _)| *from == alice_endpoint),
        "only the lower identity may invite, got {log:?}"
    );
}

/// Three nodes form a full mesh; each pair's invite goes from the lower to
/// the higher identity.
#[tokio::test(start_paused = true)]
async fn test_three_nodes_form_a_full_mesh() {
    let hub = MemoryHub::new();
    let (alice, alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;
    let (bob, bob_transport) = spawn_node(&hub, "B2", SessionConfig::default()).await;
    let (carol, _carol_transport) = spawn_node(&hub, "C3", SessionConfig::default()).await;
    settle().await;

    assert_eq!(alice.connected_peers().len(), 2);
    assert_eq!(bob.connected_peers().len(), 2);
    assert_eq!(carol.connected_peers().len(), 2);

    // Invites flowed only lower → higher: A1→B2, A1→C3, B2→C3.
    let alice_endpoint = alice_transport.current_endpoint().unwrap();
    let bob_endpoint = bob_transport.current_endpoint().unwrap();
    for (from, _) in hub.invite_log() {
        assert!(
            from == alice_endpoint || from == bob_endpoint,
            "C3 must never invite anyone"
        );
    }
}

/// Broadcast with `to = []` reaches every connected peer, and the payload
/// arrives with its parsed JSON form.
#[tokio::test(start_paused = true)]
async fn test_broadcast_reaches_connected_peers_with_parsed_json() {
    let hub = MemoryHub::new();
    let (alice, _alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;
    let (bob, _bob_transport) = spawn_node(&hub, "B2", SessionConfig::default()).await;
    let observer = RecordingObserver::new();
    bob.add_observer(observer.clone());
    settle().await;
    assert_eq!(alice.connected_peers().len(), 1);

    alice
        .send(&serde_json::json!({"counter": 41}), &[], true)
        .await;
    settle().await;

    let received = observer.data();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].1.as_ref().unwrap()["counter"], 41);
}

/// An unresponsive peer is invited exactly `max_retries` times – at t≈0, 3 s,
/// and 6 s – and at t≈9 s the inviter resets instead of sending a fourth.
#[tokio::test(start_paused = true)]
async fn test_silent_peer_exhausts_retries_then_resets() {
    let hub = MemoryHub::new();
    let (_alice, alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;

    // A node that advertises but whose events nobody ever consumes: it will
    // be found, invited, and never answer.
    let (silent, _silent_rx) = hub.create_node();
    let ghost = Peer::with_id(PeerId::new("B2"), "ghost");
    silent
        .start("ghost", huddle_core::DiscoveryRecord::for_peer(&ghost))
        .await
        .unwrap();
    settle().await;

    let first_endpoint = alice_transport.current_endpoint().unwrap();
    let invites_from = |endpoint: &EndpointId| {
        hub.invite_log()
            .iter()
            .filter(|(from, _)| from == endpoint)
            .count()
    };
    assert_eq!(invites_from(&first_endpoint), 1, "attempt 1 at t≈0");

    tokio::time::sleep(Duration::from_millis(3200)).await;
    assert_eq!(invites_from(&first_endpoint), 2, "attempt 2 at t≈3s");

    tokio::time::sleep(Duration::from_millis(3200)).await;
    assert_eq!(invites_from(&first_endpoint), 3, "attempt 3 at t≈6s");

    tokio::time::sleep(Duration::from_millis(3200)).await;
    settle().await;

    // The reset re-registered Alice under a fresh endpoint; the old endpoint
    // never sent a fourth invite.
    assert_eq!(invites_from(&first_endpoint), 3);
    let second_endpoint = alice_transport.current_endpoint().unwrap();
    assert_ne!(second_endpoint, first_endpoint, "reset restarts discovery");
}

/// A peer that resets comes back under a fresh endpoint with the same
/// identity; the stale endpoint is purged and the pair reconnects, still
/// with only the lower side inviting.
#[tokio::test(start_paused = true)]
async fn test_peer_reset_rediscovers_and_reconnects() {
    let hub = MemoryHub::new();
    let (alice, _alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;
    let (bob, bob_transport) = spawn_node(&hub, "B2", SessionConfig::default()).await;
    settle().await;
    assert_eq!(alice.connected_peers().len(), 1);
    let old_bob_endpoint = bob_transport.current_endpoint().unwrap();

    bob.reset().await;
    settle().await;
    // Give Alice's re-invite ladder room to run against the fresh endpoint.
    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;

    let new_bob_endpoint = bob_transport.current_endpoint().unwrap();
    assert_ne!(new_bob_endpoint, old_bob_endpoint);

    // Reconnected under the new endpoint; the old one is fully forgotten.
    assert_eq!(alice.connected_peers().len(), 1);
    assert_eq!(bob.connected_peers().len(), 1);
    assert_eq!(alice.link_state(&old_bob_endpoint), None);

    // The tie-break held across the reset: Bob never invited anyone.
    for (from, _) in hub.invite_log() {
        assert!(
            !from.as_str().starts_with("node-B2"),
            "B2 must never invite, got invite from {from}"
        );
    }
}

/// Receiving `pong-not-received` tears the whole session down and restarts
/// discovery; the peer list passes through empty and repopulates.
#[tokio::test(start_paused = true)]
async fn test_pong_not_received_resets_and_rejoins() {
    let hub = MemoryHub::new();
    let (alice, alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;
    let (bob, bob_transport) = spawn_node(&hub, "B2", SessionConfig::default()).await;
    settle().await;
    assert_eq!(alice.connected_peers().len(), 1);
    let first_endpoint = alice_transport.current_endpoint().unwrap();

    // Bob's liveness verdict arrives: Alice never answered a ping.
    let bob_endpoint = bob_transport.current_endpoint().unwrap();
    alice
        .handle_event(huddle_session::TransportEvent::DataReceived {
            endpoint: bob_endpoint,
            data: huddle_core::encode_control(huddle_core::ControlMessage::PongNotReceived)
                .unwrap(),
        })
        .await
        .unwrap();
    settle().await;

    // Alice restarted under a new endpoint and the pair reconverged.
    assert_ne!(
        alice_transport.current_endpoint().unwrap(),
        first_endpoint
    );
    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;
    assert_eq!(alice.connected_peers().len(), 1);
    assert_eq!(bob.connected_peers().len(), 1);
}

/// With capacity 1, a second incoming connection request is explicitly
/// rejected and the requester observes the refusal.
#[tokio::test(start_paused = true)]
async fn test_capacity_rejects_surplus_connections() {
    let hub = MemoryHub::new();
    // Carol accepts at most one peer.
    let config = SessionConfig {
        max_peer_count: 1,
        ..SessionConfig::default()
    };
    let (_alice, alice_transport) = spawn_node(&hub, "A1", SessionConfig::default()).await;
    let (carol, _carol_transport) = spawn_node(&hub, "C3", config).await;
    settle().await;
    assert_eq!(carol.connected_peers().len(), 1);

    // Bob arrives; both A1→B2 (accepted by Bob) and B2→C3 (rejected by
    // Carol, who is full) get attempted.
    let (bob, _bob_transport) = spawn_node(&hub, "B2", SessionConfig::default()).await;
    settle().await;

    assert_eq!(
        carol.connected_peers().len(),
        1,
        "Carol must stay at capacity"
    );
    assert!(
        bob.connected_peers()
            .iter()
            .all(|peer| peer.id != PeerId::new("C3")),
        "Bob cannot be connected to a full Carol"
    );
    // Alice is under the default capacity and connects to both.
    let alice_endpoint = alice_transport.current_endpoint().unwrap();
    assert!(hub
        .invite_log()
        .iter()
        .any(|(from, _)| *from == alice_endpoint));
}

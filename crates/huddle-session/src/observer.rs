//! Observer contract between the session engine and the owning application.
//!
//! The engine fans out to an explicit list of observer handles with
//! add/remove operations – ownership is explicit, so an observer either
//! outlives the session or deregisters itself before going away.  Callbacks
//! are invoked outside the engine's state lock but on its task context, so
//! they must not block.

use std::sync::Arc;

use huddle_core::{EndpointId, Peer};

/// Callbacks consumed by the owning network façade / application layer.
pub trait SessionObserver: Send + Sync {
    /// Fired whenever an endpoint's identity, connection, or liveness state
    /// changes in a way that affects the public peer view.
    fn on_peer_updated(&self, peer: &Peer);

    /// Fired for every non-control payload.  `parsed` carries the payload's
    /// JSON form when it has one, so JSON-speaking applications don't parse
    /// twice.  Control frames are consumed internally and never reach this.
    fn on_data_received(&self, data: &[u8], parsed: Option<&serde_json::Value>, from: &EndpointId);

    /// Admission policy hook for incoming connection requests.
    /// The default accepts unconditionally.
    fn should_accept(&self, _endpoint: &EndpointId) -> bool {
        true
    }
}

/// Handle returned by [`add`](ObserverRegistry::add), used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Explicit list of registered observers.
pub(crate) struct ObserverRegistry {
    next_id: u64,
    entries: Vec<(ObserverId, Arc<dyn SessionObserver>)>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn SessionObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    /// Removes a previously registered observer.  Returns `false` if the
    /// handle was already removed.
    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Snapshot of the current observers, taken so callbacks run without
    /// holding the registry lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn SessionObserver>> {
        self.entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        updates: AtomicUsize,
    }

    impl CountingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                updates: AtomicUsize::new(0),
            })
        }
    }

    impl SessionObserver for CountingObserver {
        fn on_peer_updated(&self, _peer: &Peer) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_data_received(
            &self,
            _data: &[u8],
            _parsed: Option<&serde_json::Value>,
            _from: &EndpointId,
        ) {
        }
    }

    #[test]
    fn test_add_and_remove_round_trip() {
        // Arrange
        let mut registry = ObserverRegistry::new();
        let observer = CountingObserver::new();

        // Act
        let id = registry.add(observer);

        // Assert
        assert_eq!(registry.snapshot().len(), 1);
        assert!(registry.remove(id));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_remove_twice_returns_false() {
        let mut registry = ObserverRegistry::new();
        let id = registry.add(CountingObserver::new());
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let mut registry = ObserverRegistry::new();
        let first = CountingObserver::new();
        let second = CountingObserver::new();
        registry.add(Arc::clone(&first) as Arc<dyn SessionObserver>);
        registry.add(Arc::clone(&second) as Arc<dyn SessionObserver>);

        let snapshot = registry.snapshot();
        snapshot[0].on_peer_updated(&Peer::new("x"));

        assert_eq!(first.updates.load(Ordering::SeqCst), 1);
        assert_eq!(second.updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_admission_accepts() {
        let observer = CountingObserver::new();
        assert!(observer.should_accept(&EndpointId::new("anyone")));
    }
}

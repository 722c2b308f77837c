//! # huddle-session
//!
//! The session/discovery protocol engine for Huddle: given an abstract
//! transport that can advertise, browse, and open byte-channels on a local
//! network, this crate turns a stream of raw transport events into a
//! consistent view of nearby peers and a simple send/receive surface.
//!
//! The engine coordinates four concerns:
//!
//! - **Peer directory** – maps ephemeral transport endpoints to stable peer
//!   identities and deduplicates multiple endpoints belonging to the same
//!   device.
//! - **Invite coordination** – a deterministic identity tie-break decides
//!   which side of a discovered pair initiates the connection, with a bounded
//!   retry/backoff ladder when the attempt does not settle.
//! - **Liveness probing** – an application-level ping/pong catches channels
//!   the transport still believes are open but that are actually dead
//!   (backgrounded devices, half-open links).
//! - **Session orchestration** – one lock around all shared state, observer
//!   fan-out, and a single recovery primitive: the full session reset.
//!
//! Transport adapters implement [`Transport`] and feed [`TransportEvent`]s to
//! [`Session::handle_event`] (or through [`Session::spawn_event_pump`]).  An
//! in-memory transport ([`MemoryHub`]) is included for tests and demos.

pub mod engine;
pub mod error;
pub mod observer;
pub mod transport;

mod directory;
mod invite;
mod probe;
mod timer;

pub use engine::Session;
pub use error::SessionError;
pub use observer::{ObserverId, SessionObserver};
pub use transport::memory::{MemoryHub, MemoryTransport};
pub use transport::{Transport, TransportError, TransportEvent};

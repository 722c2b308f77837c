//! # huddle-core
//!
//! Shared library for Huddle containing the domain entities and the wire
//! codec for the discovery/session protocol.
//!
//! This crate is used by the session engine, by transport adapters, and by
//! applications.  It has zero dependencies on OS APIs, network sockets, or an
//! async runtime.
//!
//! # Architecture overview (for beginners)
//!
//! Huddle lets a handful of nearby devices (phones, laptops – anything on the
//! same local network) find each other and form an ad-hoc session with no
//! central server.  Each device advertises an opaque identity token, browses
//! for other devices, and a deterministic tie-break decides which side of any
//! pair initiates the connection.
//!
//! This crate (`huddle-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure data types: the stable peer identity (`PeerId`,
//!   `Peer`), the ephemeral transport endpoint handle (`EndpointId`), the
//!   per-endpoint link state, and the session configuration with its retry
//!   and probe timing defaults.
//!
//! - **`protocol`** – How bytes travel over the wire.  Control messages
//!   (`ping` / `pong` / `pong-not-received`) use a minimal key-presence JSON
//!   encoding that is attempted first on every inbound buffer; anything that
//!   does not decode as a control frame falls through to the application.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `huddle_core::Peer` instead of `huddle_core::domain::peer::Peer`.
pub use domain::config::SessionConfig;
pub use domain::peer::{EndpointId, LinkState, Peer, PeerId};
pub use protocol::codec::{
    decode_control, decode_json, encode_control, encode_payload, CodecError,
};
pub use protocol::messages::{ControlMessage, DiscoveryRecord};

//! huddle-demo library entry point.
//!
//! Re-exports the configuration module so that the binary in `main.rs` and
//! the unit tests share the same module tree.

pub mod config;

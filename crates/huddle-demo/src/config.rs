//! TOML-based configuration for the demo application.
//!
//! Example file:
//!
//! ```toml
//! [node]
//! display_name = "living-room-tv"
//! log_level = "debug"
//!
//! [session]
//! service_name = "huddle-demo"
//! max_peer_count = 4
//! retry_wait_ms = 3000
//! max_retries = 3
//! invite_timeout_ms = 8000
//! probe_timeout_ms = 2000
//! ```
//!
//! Fields annotated with `#[serde(default = "…")]` fall back to the protocol
//! defaults when absent, so a partial (or missing) file still yields a
//! working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use huddle_core::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level demo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DemoConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub session: SessionTunables,
}

/// Settings for this node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Name shown to other peers.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Session engine tunables; see the protocol defaults in
/// [`huddle_core::SessionConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTunables {
    /// Discovery channel name; only nodes on the same channel see each other.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Maximum simultaneously connected peers.
    #[serde(default = "default_max_peer_count")]
    pub max_peer_count: usize,
    /// Wait between invite attempts, in milliseconds.
    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,
    /// Invite attempts before escalating to a session reset.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long one invite stays outstanding, in milliseconds.
    #[serde(default = "default_invite_timeout_ms")]
    pub invite_timeout_ms: u64,
    /// How long to wait for a pong after a liveness ping, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl SessionTunables {
    /// Maps the file schema onto the engine's construction-time config.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            service_name: self.service_name.clone(),
            max_peer_count: self.max_peer_count,
            retry_wait: Duration::from_millis(self.retry_wait_ms),
            max_retries: self.max_retries,
            invite_timeout: Duration::from_millis(self.invite_timeout_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_display_name() -> String {
    "huddle-node".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_service_name() -> String {
    "huddle-demo".to_string()
}
fn default_max_peer_count() -> usize {
    4
}
fn default_retry_wait_ms() -> u64 {
    3000
}
fn default_max_retries() -> u32 {
    3
}
fn default_invite_timeout_ms() -> u64 {
    8000
}
fn default_probe_timeout_ms() -> u64 {
    2000
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionTunables {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            max_peer_count: default_max_peer_count(),
            retry_wait_ms: default_retry_wait_ms(),
            max_retries: default_max_retries(),
            invite_timeout_ms: default_invite_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Loads the configuration from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not valid TOML.  Callers typically fall
/// back to [`DemoConfig::default`] on a missing file.
pub fn load_config(path: &Path) -> Result<DemoConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_protocol_defaults() {
        // Arrange / Act
        let config = DemoConfig::default();
        let session = config.session.to_session_config();

        // Assert – the file defaults and the engine defaults must agree on
        // timing, or a config-less demo behaves differently from the tests.
        assert_eq!(session.retry_wait, Duration::from_secs(3));
        assert_eq!(session.max_retries, 3);
        assert_eq!(session.invite_timeout, Duration::from_secs(8));
        assert_eq!(session.probe_timeout, Duration::from_secs(2));
        assert_eq!(session.max_peer_count, 4);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: DemoConfig = toml::from_str("").expect("empty file parses");
        assert_eq!(config, DemoConfig::default());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields() {
        let config: DemoConfig = toml::from_str(
            r#"
            [node]
            display_name = "kitchen-tablet"

            [session]
            max_peer_count = 7
            "#,
        )
        .expect("partial file parses");

        assert_eq!(config.node.display_name, "kitchen-tablet");
        assert_eq!(config.node.log_level, "info");
        assert_eq!(config.session.max_peer_count, 7);
        assert_eq!(config.session.retry_wait_ms, 3000);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = DemoConfig {
            node: NodeConfig {
                display_name: "den-console".to_string(),
                log_level: "debug".to_string(),
            },
            session: SessionTunables {
                service_name: "game-night".to_string(),
                max_peer_count: 8,
                retry_wait_ms: 1000,
                max_retries: 5,
                invite_timeout_ms: 4000,
                probe_timeout_ms: 1500,
            },
        };

        let text = toml::to_string(&config).expect("serializes");
        let back: DemoConfig = toml::from_str(&text).expect("parses back");
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_config_missing_file_is_an_io_error() {
        let result = load_config(Path::new("/nonexistent/huddle.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}

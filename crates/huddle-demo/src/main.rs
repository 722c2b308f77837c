//! Huddle demo: a simulated room of devices on one in-memory network.
//!
//! Spins up three session engines on a shared [`MemoryHub`] – the in-memory
//! stand-in for a real local-network transport – and lets them discover each
//! other, tie-break invites, and exchange a counter payload.  Watch the log
//! to see the protocol at work:
//!
//! ```text
//! huddle-demo [path/to/huddle.toml]
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML file, defaults if absent
//!  └─ MemoryHub::new()       -- the simulated room
//!       ├─ Session "alpha"   -- broadcasts a counter every 2 s
//!       ├─ Session "beta"
//!       └─ Session "gamma"
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use huddle_core::{EndpointId, Peer, SessionConfig};
use huddle_demo::config::{load_config, DemoConfig};
use huddle_session::{MemoryHub, Session, SessionObserver, Transport};

/// Observer that narrates peer and data traffic into the log.
struct LoggingObserver {
    node: String,
}

impl SessionObserver for LoggingObserver {
    fn on_peer_updated(&self, peer: &Peer) {
        info!(
            "[{}] peer updated: \"{}\" ({})",
            self.node, peer.display_name, peer.id
        );
    }

    fn on_data_received(
        &self,
        data: &[u8],
        parsed: Option<&serde_json::Value>,
        from: &EndpointId,
    ) {
        match parsed {
            Some(value) => info!("[{}] received {value} from {from}", self.node),
            None => info!("[{}] received {} raw bytes from {from}", self.node, data.len()),
        }
    }
}

/// Builds one node on the hub: session, observer, event pump.
async fn spawn_node(
    hub: &Arc<MemoryHub>,
    display_name: &str,
    config: SessionConfig,
) -> anyhow::Result<Arc<Session>> {
    let (transport, events) = hub.create_node();
    let session = Session::new(
        Peer::new(display_name),
        config,
        transport as Arc<dyn Transport>,
    );
    session.add_observer(Arc::new(LoggingObserver {
        node: display_name.to_string(),
    }));
    session.spawn_event_pump(events);
    session.start().await?;
    Ok(session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first: the log level may come from the file.
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "huddle.toml".to_string());
    let config = match load_config(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            let config = DemoConfig::default();
            eprintln!("using default configuration ({e})");
            config
        }
    };

    // Structured logging; `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.node.log_level.clone())),
        )
        .init();

    info!("huddle demo starting (service \"{}\")", config.session.service_name);

    // The simulated room.
    let hub = MemoryHub::new();
    let session_config = config.session.to_session_config();

    let alpha = spawn_node(&hub, &config.node.display_name, session_config.clone()).await?;
    let _beta = spawn_node(&hub, "beta", session_config.clone()).await?;
    let _gamma = spawn_node(&hub, "gamma", session_config).await?;

    // One node broadcasts a counter so data flow is visible in the log.
    let broadcaster = Arc::clone(&alpha);
    tokio::spawn(async move {
        let mut counter: u64 = 0;
        loop {
            tokio::time::sleep(Duration::from_secs(2)).await;
            counter += 1;
            let connected = broadcaster.connected_peers();
            info!(
                "[{}] broadcasting counter {counter} to {} peer(s)",
                broadcaster.local_peer().display_name,
                connected.len()
            );
            broadcaster
                .send(&serde_json::json!({ "counter": counter }), &[], true)
                .await;
        }
    });

    info!("huddle demo ready; press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    alpha.stop().await;

    Ok(())
}

//! ==============================================================================
//! main.rs - device tracker entry point
//! ==============================================================================
//!
//! purpose:
//!     the registry process. devices report positions over http, viewers poll
//!     the snapshot, admins rename and delete devices.
//!
//! responsibilities:
//!     - load configuration (config/tracker.toml, TRACKER_* overrides)
//!     - install the tracing subscriber
//!     - construct the one registry and clock for the process
//!     - serve the http api until the listener fails
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                    tracker (this file)                   │
//!     │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  │
//!     │  │  ingestion   │   │    query     │   │    admin     │  │
//!     │  │ /update, /   │   │ /get_devices │   │ rename/delete│  │
//!     │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘  │
//!     │         └──────────────────┼──────────────────┘          │
//!     │                      ┌─────┴─────┐                       │
//!     │                      │ registry  │ <- registry.rs        │
//!     │                      └───────────┘                       │
//!     │      (Clone-able handle to one shared device map)        │
//!     └──────────────────────────────────────────────────────────┘
//!
//! state is in memory only: a restart forgets every device.
//!
//! ==============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use device_tracker::clock::SystemClock;
use device_tracker::config::TrackerConfig;
use device_tracker::logging::init_tracing;
use device_tracker::registry::Registry;
use device_tracker::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config = TrackerConfig::load_or_default();

    // step 2: logging
    init_tracing(&config.logging.level);
    info!("device tracker starting");
    config.print_summary();

    // step 3: the one registry for this process
    let state = AppState::new(
        Registry::new(),
        Arc::new(SystemClock),
        config.admin.passcode.as_str(),
    )
    .with_update_logging(config.logging.log_updates);

    // step 4: serve
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %address, "listening");

    server::serve(listener, state).await.context("http server stopped")
}

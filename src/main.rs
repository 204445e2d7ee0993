//! chatterd - text chat relay daemon.
//!
//! Clients connect over TCP, register a unique username, and exchange
//! messages through three fan-out scopes: global broadcast, named groups,
//! and hashtag/keyword topics, plus direct user-to-user delivery.

mod config;
mod error;
mod filter;
mod network;
mod router;
mod state;

use crate::config::Config;
use crate::filter::WordFilter;
use crate::network::Gateway;
use crate::state::Relay;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        "Starting chatterd"
    );

    let filter =
        WordFilter::load(config.filter.wordlist.as_deref().map(Path::new), &config.filter.words);

    let (relay, mut disconnect_rx) = Relay::new(config.server.name.clone(), filter);

    // Teardown worker: delivery failures are observed inside other sessions'
    // operations; the cascade runs here instead of unwinding the sender.
    {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            while let Some(req) = disconnect_rx.recv().await {
                relay.teardown_session(req.id, req.reason);
            }
        });
    }

    let gateway = Gateway::bind(config.server.listen, relay, config.limits.clone()).await?;
    gateway.run().await
}

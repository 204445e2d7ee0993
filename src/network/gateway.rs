//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds one socket and spawns a connection task per incoming
//! client. A failed accept never takes the process down; each session is its
//! own fault domain from the moment it is spawned.

use super::connection::run_connection;
use crate::config::LimitsConfig;
use crate::router::Router;
use crate::state::Relay;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Accepts incoming TCP connections and spawns session tasks.
pub struct Gateway {
    listener: TcpListener,
    relay: Arc<Relay>,
    router: Arc<Router>,
    limits: LimitsConfig,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(addr: SocketAddr, relay: Arc<Relay>, limits: LimitsConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Listener bound");
        let router = Arc::new(Router::new(Arc::clone(&relay)));
        Ok(Self { listener, relay, router, limits })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the gateway, accepting connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let relay = Arc::clone(&self.relay);
                    let router = Arc::clone(&self.router);
                    let limits = self.limits.clone();
                    tokio::spawn(async move {
                        run_connection(relay, router, stream, addr, limits).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

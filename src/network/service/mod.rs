// Relay service module

pub mod listener;
pub mod dialer;
pub mod console;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use log::{error, info};

use crate::network::error::RelayError;
use crate::network::hub::RelayHub;
use crate::network::service::listener::{bind_listener, run_accept_loop};
use crate::network::RelayConfig;

/// A running relay: the accept loop plus the shared hub
pub struct RelayServer {
    /// Shared relay state
    hub: Arc<RelayHub>,

    /// Address the listener is bound to
    local_addr: SocketAddr,

    /// Signals the accept loop to stop
    shutdown_tx: watch::Sender<bool>,

    /// Accept loop task
    accept_task: JoinHandle<()>,
}

impl RelayServer {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared relay state, for moderation and handlers
    pub fn hub(&self) -> Arc<RelayHub> {
        self.hub.clone()
    }

    /// Stop accepting connections and close the listener.
    ///
    /// Connections that are already up keep running until their peers leave
    /// or are kicked.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.accept_task.await {
            error!("Accept loop ended abnormally: {}", e);
        }

        info!("Relay on {} stopped accepting", self.local_addr);
    }
}

/// Bind the listener and start accepting connections.
///
/// Failing to bind is the only fatal error.
pub async fn start_relay(config: RelayConfig) -> Result<RelayServer, RelayError> {
    let listener = bind_listener(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let hub = Arc::new(RelayHub::new(&config));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let accept_task = tokio::spawn(run_accept_loop(listener, hub.clone(), shutdown_rx));

    Ok(RelayServer {
        hub,
        local_addr,
        shutdown_tx,
        accept_task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_on_ephemeral_port() {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..RelayConfig::default()
        };

        let server = start_relay(config).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.hub().peer_count(), 0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_fails_when_port_taken() {
        let first = start_relay(RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..RelayConfig::default()
        })
        .await
        .unwrap();

        let second = start_relay(RelayConfig {
            bind_addr: first.local_addr(),
            ..RelayConfig::default()
        })
        .await;

        assert!(matches!(second, Err(RelayError::Bind { .. })));
        first.shutdown().await;
    }
}

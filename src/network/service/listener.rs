use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use log::{debug, error, info, warn};

use crate::network::error::RelayError;
use crate::network::hub::RelayHub;

/// Pause after a failed accept so persistent errors don't spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the listening socket
pub async fn bind_listener(bind_addr: SocketAddr) -> Result<TcpListener, RelayError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| RelayError::Bind { addr: bind_addr, source })?;

    info!("Server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections until shutdown is signalled.
///
/// Each connection runs on its own task. Accept errors are logged and the
/// loop keeps going. Returning drops the listener; connection tasks already
/// spawned keep running until their peers leave.
pub async fn run_accept_loop(
    listener: TcpListener,
    hub: Arc<RelayHub>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let tcp_nodelay = hub.config().tcp_nodelay;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);

                        if tcp_nodelay {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                            }
                        }

                        let hub = hub.clone();
                        tokio::spawn(async move {
                            hub.serve_connection(stream, addr).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting client connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Stopped accepting connections");
}

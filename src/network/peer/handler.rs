use std::sync::Arc;
use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::network::error::RelayError;
use crate::network::hub::RelayHub;
use crate::network::peer::registry::PeerHandle;
use crate::network::peer::state::{CloseReason, ConnectionState, RefusalReason, TerminationReason};
use crate::network::types::{Payload, PeerAddress};

/// Drives one connection through admission, relaying and cleanup.
///
/// Owns the stream for its whole life. Other tasks reach the peer only
/// through its `PeerHandle`: payloads land in the outbound queue and a kick
/// fires the close signal, both of which this handler's loop picks up.
pub struct PeerHandler<S> {
    /// Stream for the connection
    stream: S,

    /// Peer address
    addr: PeerAddress,

    /// Shared relay state
    hub: Arc<RelayHub>,

    /// Current lifecycle state
    state: ConnectionState,
}

impl<S> PeerHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a handler for a freshly accepted connection
    pub fn new(stream: S, addr: PeerAddress, hub: Arc<RelayHub>) -> Self {
        Self {
            stream,
            addr,
            hub,
            state: ConnectionState::Unadmitted,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn advance(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Peer {}: {:?} -> {:?}", self.addr, self.state, next);
        self.state = next;
    }

    /// Handle the connection until it terminates
    pub async fn run(mut self) -> TerminationReason {
        let (handle, mut outbound_rx) = match self.hub.admit(self.addr) {
            Ok(admitted) => admitted,
            Err(e) => {
                let refusal = match e {
                    RelayError::Banned(_) => {
                        info!("Connection attempt from banned client {}", self.addr);
                        RefusalReason::Banned
                    }
                    other => {
                        warn!("Refused connection from {}: {}", self.addr, other);
                        RefusalReason::Duplicate
                    }
                };

                self.advance(ConnectionState::Terminated);
                self.close_stream().await;
                return TerminationReason::Refused(refusal);
            }
        };

        self.advance(ConnectionState::Admitted);
        info!("New connection from {} ({})", self.addr, handle.id());

        // Deregisters on every way out of the loop, unwinding included
        let hub = self.hub.clone();
        let registration = scopeguard::guard(handle.clone(), move |handle| {
            if hub.release(&handle) {
                debug!("Released registry entry for {} ({})", handle.addr(), handle.id());
            }
        });

        self.advance(ConnectionState::Active);
        let reason = self.relay_loop(&handle, &mut outbound_rx).await;

        drop(registration);
        outbound_rx.close();
        self.close_stream().await;
        self.advance(ConnectionState::Terminated);

        info!("Connection closed with {} ({}): {}", self.addr, handle.id(), reason);
        reason
    }

    async fn relay_loop(
        &mut self,
        handle: &PeerHandle,
        outbound_rx: &mut mpsc::Receiver<Payload>,
    ) -> TerminationReason {
        let addr = self.addr;
        let hub = self.hub.clone();
        let mut buf = vec![0u8; hub.config().read_buffer_size.max(1)];
        let (mut reader, mut writer) = io::split(&mut self.stream);

        // Unbiased: a queue kept busy by other peers must not starve this
        // peer's own reads, nor the other way round.
        loop {
            tokio::select! {
                _ = handle.closed() => {
                    return closed_by_relay(handle);
                }

                outbound = outbound_rx.recv() => {
                    let payload = match outbound {
                        Some(payload) => payload,
                        None => return closed_by_relay(handle),
                    };

                    tokio::select! {
                        biased;

                        _ = handle.closed() => {
                            return closed_by_relay(handle);
                        }

                        result = writer.write_all(&payload) => {
                            if let Err(e) = result {
                                warn!("Error sending data to {}: {}", addr, e);
                                return TerminationReason::WriteFailed(e.to_string());
                            }
                        }
                    }
                }

                read = reader.read(&mut buf) => {
                    match read {
                        Ok(0) => return TerminationReason::PeerClosed,
                        Ok(n) => {
                            let payload = Bytes::copy_from_slice(&buf[..n]);
                            hub.relay(&payload, addr).await;
                        }
                        Err(e) => {
                            error!("Error handling client connection {}: {}", addr, e);
                            return TerminationReason::ReadFailed(e.to_string());
                        }
                    }
                }
            }
        }
    }

    async fn close_stream(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Error shutting down stream for {}: {}", self.addr, e);
        }
    }
}

fn closed_by_relay(handle: &PeerHandle) -> TerminationReason {
    TerminationReason::Closed(handle.close_reason().unwrap_or(CloseReason::Kicked))
}

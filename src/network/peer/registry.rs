use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use log::{debug, warn};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::network::error::RelayError;
use crate::network::peer::state::CloseReason;
use crate::network::types::{ConnectionId, Payload, PeerAddress};

/// Handle to a live connection, held in the registry.
///
/// The socket itself stays with the connection's own task; the handle only
/// carries its outbound queue and a close signal, so it is cheap to clone and
/// safe to use from any task.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    /// Peer's address
    addr: PeerAddress,

    /// Id of this particular connection
    id: ConnectionId,

    /// Queue drained by the connection's task into its socket
    outbound: mpsc::Sender<Payload>,

    /// Fired to force the connection closed
    closer: CancellationToken,

    /// First close reason wins
    close_reason: Arc<OnceCell<CloseReason>>,

    /// When the connection was admitted
    connected_at: Instant,
}

impl PeerHandle {
    /// Create a handle and the receiving end of its outbound queue
    pub fn new(addr: PeerAddress, queue_size: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (outbound, outbound_rx) = mpsc::channel(queue_size.max(1));

        let handle = Self {
            addr,
            id: ConnectionId::next(),
            outbound,
            closer: CancellationToken::new(),
            close_reason: Arc::new(OnceCell::new()),
            connected_at: Instant::now(),
        };

        (handle, outbound_rx)
    }

    /// Peer's address
    pub fn addr(&self) -> PeerAddress {
        self.addr
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// When the connection was admitted
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Queue a payload for delivery without waiting.
    ///
    /// Payloads are slices of an unframed stream, so one can't be dropped
    /// and the rest still delivered. A full queue closes the connection
    /// with `CloseReason::Overflow` instead.
    pub fn try_send(&self, payload: Payload) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::ConnectionClosed(self.addr));
        }

        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => {
                if self.close(CloseReason::Overflow) {
                    warn!("Outbound queue full for {} ({}), closing connection", self.addr, self.id);
                }
                RelayError::QueueFull(self.addr)
            }
            TrySendError::Closed(_) => RelayError::ConnectionClosed(self.addr),
        })
    }

    /// Force the connection closed. Returns false if it was already closing.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self.close_reason.set(reason).is_ok();
        self.closer.cancel();
        first
    }

    /// Check if a close has been requested
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Reason passed to the first `close` call
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Wait until a close is requested
    pub async fn closed(&self) {
        self.closer.cancelled().await
    }
}

/// Registry of live connections keyed by peer address.
///
/// Not synchronized itself; `RelayHub` keeps it behind the same lock as the
/// ban set.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<PeerAddress, PeerHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning the handle it displaced, if any
    pub fn register(&mut self, handle: PeerHandle) -> Option<PeerHandle> {
        let addr = handle.addr();
        let id = handle.id();
        let previous = self.connections.insert(addr, handle);

        debug!("Registered peer {} ({})", addr, id);
        previous
    }

    /// Remove the connection for an address, if present
    pub fn unregister(&mut self, addr: &PeerAddress) -> Option<PeerHandle> {
        let removed = self.connections.remove(addr);
        if let Some(handle) = &removed {
            debug!("Unregistered peer {} ({})", addr, handle.id());
        }
        removed
    }

    /// Remove the entry for `addr` only if it still belongs to connection `id`
    pub fn unregister_if(&mut self, addr: &PeerAddress, id: ConnectionId) -> bool {
        match self.connections.get(addr) {
            Some(handle) if handle.id() == id => self.unregister(addr).is_some(),
            _ => false,
        }
    }

    /// Look up the connection for an address
    pub fn lookup(&self, addr: &PeerAddress) -> Option<PeerHandle> {
        self.connections.get(addr).cloned()
    }

    /// Check if an address is registered
    pub fn contains(&self, addr: &PeerAddress) -> bool {
        self.connections.contains_key(addr)
    }

    /// Point-in-time copy of all entries, ordered by address
    pub fn snapshot(&self) -> Vec<(PeerAddress, PeerHandle)> {
        self.connections
            .iter()
            .map(|(addr, handle)| (*addr, handle.clone()))
            .collect()
    }

    /// Registered addresses, ordered
    pub fn addresses(&self) -> Vec<PeerAddress> {
        self.connections.keys().copied().collect()
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connections are registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

//! Relay core: connection registry, ban set and handler registry behind one
//! shared object that every connection task holds an `Arc` to.
//!
//! The registry and the ban set share a single lock. Admission checks the ban
//! set and registers under that lock, and moderation (see `moderation.rs`)
//! kicks and bans under it too, so a peer can never slip into the registry
//! after its ban was recorded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::DuplicatePolicy;
use crate::network::error::RelayError;
use crate::network::handlers::{FnHandler, HandlerError, HandlerRegistry, InvocationReport, PayloadHandler};
use crate::network::peer::bans::BanSet;
use crate::network::peer::broadcaster::{self, BroadcastReport};
use crate::network::peer::handler::PeerHandler;
use crate::network::peer::registry::{ConnectionRegistry, PeerHandle};
use crate::network::peer::state::{CloseReason, TerminationReason};
use crate::network::types::{Payload, PeerAddress};
use crate::network::RelayConfig;

/// How often `wait_until_idle` rechecks the registry
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registry and ban set, guarded together
#[derive(Debug, Default)]
pub(crate) struct PeerTable {
    pub(crate) connections: ConnectionRegistry,
    pub(crate) bans: BanSet,
}

/// Shared relay state
pub struct RelayHub {
    /// Live connections and bans
    peers: Mutex<PeerTable>,

    /// Named payload handlers
    handlers: HandlerRegistry,

    /// Runtime configuration
    config: RelayConfig,
}

impl RelayHub {
    /// Create a new hub
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            peers: Mutex::new(PeerTable::default()),
            handlers: HandlerRegistry::new(),
            config: config.clone(),
        }
    }

    /// Runtime configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // Every critical section leaves the table consistent, so a poisoned lock
    // is still safe to use.
    pub(crate) fn peers(&self) -> MutexGuard<'_, PeerTable> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the full lifecycle of one accepted connection.
    ///
    /// Returns once the connection has been deregistered and closed. Never
    /// fails: every error ends the connection and is reported in the result.
    pub async fn serve_connection<S>(self: &Arc<Self>, stream: S, addr: PeerAddress) -> TerminationReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        PeerHandler::new(stream, addr, self.clone()).run().await
    }

    /// Ban check and registration, atomically
    pub(crate) fn admit(&self, addr: PeerAddress) -> Result<(PeerHandle, mpsc::Receiver<Payload>), RelayError> {
        let mut peers = self.peers();

        if peers.bans.is_banned(&addr) {
            return Err(RelayError::Banned(addr));
        }

        if let Some(existing) = peers.connections.lookup(&addr) {
            match self.config.duplicate_policy {
                DuplicatePolicy::Reject => return Err(RelayError::DuplicatePeer(addr)),
                DuplicatePolicy::Replace => {
                    warn!("Peer {} reconnected, closing previous connection {}", addr, existing.id());
                    existing.close(CloseReason::Replaced);
                }
            }
        }

        let (handle, outbound_rx) = PeerHandle::new(addr, self.config.outbound_queue_size);
        peers.connections.register(handle.clone());

        Ok((handle, outbound_rx))
    }

    /// Deregister a connection if the registry entry is still its own
    pub(crate) fn release(&self, handle: &PeerHandle) -> bool {
        self.peers().connections.unregister_if(&handle.addr(), handle.id())
    }

    /// Look up the handle for a connected peer
    pub fn lookup(&self, addr: &PeerAddress) -> Option<PeerHandle> {
        self.peers().connections.lookup(addr)
    }

    /// Point-in-time copy of the registry, ordered by address
    pub fn snapshot(&self) -> Vec<(PeerAddress, PeerHandle)> {
        self.peers().connections.snapshot()
    }

    /// Check if a peer is connected
    pub fn is_connected(&self, addr: &PeerAddress) -> bool {
        self.peers().connections.contains(addr)
    }

    /// Addresses of connected peers
    pub fn connected_peers(&self) -> Vec<PeerAddress> {
        self.peers().connections.addresses()
    }

    /// Number of connected peers
    pub fn peer_count(&self) -> usize {
        self.peers().connections.len()
    }

    /// Resolve once no peers are connected
    pub async fn wait_until_idle(&self) {
        while self.peer_count() > 0 {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Check if an address is banned
    pub fn is_banned(&self, addr: &PeerAddress) -> bool {
        self.peers().bans.is_banned(addr)
    }

    /// Banned addresses
    pub fn banned_peers(&self) -> Vec<PeerAddress> {
        self.peers().bans.addresses()
    }

    /// Send a payload to every connected peer except `origin`
    pub fn broadcast(&self, payload: &Payload, origin: PeerAddress) -> BroadcastReport {
        let recipients = self.snapshot();
        broadcaster::broadcast(&recipients, payload, origin)
    }

    /// Relay one payload read from `origin`: fan it out, then run the handlers
    pub async fn relay(&self, payload: &Payload, origin: PeerAddress) -> (BroadcastReport, InvocationReport) {
        let broadcast = self.broadcast(payload, origin);
        let invocation = self.handlers.invoke_all(payload, origin).await;
        (broadcast, invocation)
    }

    /// Send a payload to a single peer.
    ///
    /// Returns false if the peer is not connected or delivery failed.
    pub fn send_response(&self, addr: &PeerAddress, payload: Payload) -> bool {
        let handle = match self.lookup(addr) {
            Some(handle) => handle,
            None => return false,
        };

        match broadcaster::unicast(&handle, payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error sending response to {}: {}", addr, e);
                false
            }
        }
    }

    /// Register a payload handler, replacing any handler with the same name
    pub fn add_handler<H>(&self, name: &str, handler: H)
    where
        H: PayloadHandler + 'static,
    {
        self.add_shared_handler(name, Arc::new(handler));
    }

    /// Register an already shared payload handler
    pub fn add_shared_handler(&self, name: &str, handler: Arc<dyn PayloadHandler>) {
        if self.handlers.register(name, handler) {
            info!("Replaced handler {}", name);
        } else {
            info!("Added handler {}", name);
        }
    }

    /// Register a closure as a payload handler
    pub fn add_handler_fn<F>(&self, name: &str, func: F)
    where
        F: Fn(&Payload, PeerAddress) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.add_handler(name, FnHandler::new(func));
    }

    /// Remove a payload handler. Returns false if none had that name.
    pub fn remove_handler(&self, name: &str) -> bool {
        let removed = self.handlers.remove(name);
        if removed {
            info!("Removed handler {}", name);
        }
        removed
    }

    /// Names of registered handlers
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.names()
    }
}

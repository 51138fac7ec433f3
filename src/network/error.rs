use std::io;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ConfigError;
use crate::network::types::PeerAddress;

/// Relay error types
#[derive(Debug, Error)]
pub enum RelayError {
    /// Peer is in the ban set
    #[error("Peer {0} is banned")]
    Banned(PeerAddress),

    /// Another connection from the same address is registered
    #[error("Peer {0} is already connected")]
    DuplicatePeer(PeerAddress),

    /// No connection registered for the address
    #[error("Peer {0} not found")]
    PeerNotFound(PeerAddress),

    /// Recipient's outbound queue is full
    #[error("Outbound queue full for peer {0}")]
    QueueFull(PeerAddress),

    /// Recipient's connection has already terminated
    #[error("Connection to peer {0} is closed")]
    ConnectionClosed(PeerAddress),

    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// Lanrelay Network Module
//
// This module provides the relay core and the plumbing around it:
// - Connection registry, ban set and moderation (kick/ban/unban)
// - Fan-out of each peer's bytes to every other peer
// - Named payload handlers invoked for every relayed payload
// - TCP acceptor, dialer and a small client

pub mod types;
pub mod error;
pub mod peer;
pub mod handlers;
pub mod hub;
pub mod moderation;
pub mod service;
pub mod client;

use std::net::{IpAddr, SocketAddr};

use crate::config::{Config, ConfigError, DuplicatePolicy};

pub use error::RelayError;
pub use hub::RelayHub;
pub use service::{start_relay, RelayServer};
pub use types::{ConnectionId, Payload, PeerAddress};

/// Runtime configuration for the relay
#[derive(Clone, Debug, PartialEq)]
pub struct RelayConfig {
    /// Local address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum bytes read from a peer per payload
    pub read_buffer_size: usize,

    /// Capacity of each peer's outbound queue
    pub outbound_queue_size: usize,

    /// Disable Nagle's algorithm on accepted sockets
    pub tcp_nodelay: bool,

    /// Handling of a second connection from a registered address
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            read_buffer_size: 4096,
            outbound_queue_size: 256,
            tcp_nodelay: true,
            duplicate_policy: DuplicatePolicy::Replace,
        }
    }
}

impl RelayConfig {
    /// Build the runtime configuration from a loaded config file
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let network = &config.network;

        let ip: IpAddr = network.listen_addr.parse()
            .map_err(|_| ConfigError::InvalidAddress(network.listen_addr.clone()))?;

        if network.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size must be greater than zero".to_string()));
        }

        if network.outbound_queue_size == 0 {
            return Err(ConfigError::Invalid("outbound_queue_size must be greater than zero".to_string()));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(ip, network.listen_port),
            read_buffer_size: network.read_buffer_size,
            outbound_queue_size: network.outbound_queue_size,
            tcp_nodelay: network.tcp_nodelay,
            duplicate_policy: network.duplicate_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:5000");
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
    }

    #[test]
    fn test_relay_config_from_file_config() {
        let mut config = Config::default();
        config.network.listen_addr = "0.0.0.0".to_string();
        config.network.listen_port = 6000;
        config.network.duplicate_policy = DuplicatePolicy::Reject;

        let relay_config = RelayConfig::from_config(&config).unwrap();
        assert_eq!(relay_config.bind_addr.to_string(), "0.0.0.0:6000");
        assert_eq!(relay_config.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_relay_config_rejects_bad_values() {
        let mut config = Config::default();
        config.network.listen_addr = "not-an-ip".to_string();
        assert!(matches!(RelayConfig::from_config(&config), Err(ConfigError::InvalidAddress(_))));

        let mut config = Config::default();
        config.network.read_buffer_size = 0;
        assert!(matches!(RelayConfig::from_config(&config), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.network.outbound_queue_size = 0;
        assert!(matches!(RelayConfig::from_config(&config), Err(ConfigError::Invalid(_))));
    }
}

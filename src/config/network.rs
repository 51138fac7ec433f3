use serde::{Serialize, Deserialize};

/// What to do when a peer connects from an address that is already registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Close the existing connection and register the new one
    Replace,

    /// Refuse the new connection and keep the existing one
    Reject,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        DuplicatePolicy::Replace
    }
}

/// Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen address
    pub listen_addr: String,

    /// Listen port
    pub listen_port: u16,

    /// Maximum bytes read from a peer per payload
    pub read_buffer_size: usize,

    /// Payloads queued per peer before deliveries to it start failing
    pub outbound_queue_size: usize,

    /// Disable Nagle's algorithm on accepted sockets
    pub tcp_nodelay: bool,

    /// Handling of a second connection from a registered address
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 5000,
            read_buffer_size: 4096,
            outbound_queue_size: 256,
            tcp_nodelay: true,
            duplicate_policy: DuplicatePolicy::Replace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_policy_serialization() {
        let config: NetworkConfig = toml::from_str("duplicate_policy = \"reject\"").unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);

        let text = toml::to_string(&NetworkConfig::default()).unwrap();
        assert!(text.contains("duplicate_policy = \"replace\""));
    }
}

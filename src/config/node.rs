use serde::{Serialize, Deserialize};

/// Node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name
    pub node_name: String,

    /// Log level
    pub log_level: String,

    /// Read operator commands from stdin
    pub admin_console: bool,

    /// Register the traffic logging handler
    pub log_traffic: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "lanrelay".to_string(),
            log_level: "info".to_string(),
            admin_console: true,
            log_traffic: false,
        }
    }
}

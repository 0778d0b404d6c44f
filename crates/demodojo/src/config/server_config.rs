use crate::config::{default_bind, default_port};

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Embedded WebSocket/HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port surfaces connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to listen on.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

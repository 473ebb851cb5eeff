//! HTTP listener configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Where the sync endpoint listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Parse `host:port` into a socket address. IPv6 hosts may be bare or bracketed.
    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let candidate = if host.contains(':') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        };
        candidate.parse().map_err(|e| {
            AppError::configuration(format!("Invalid listen address {candidate}: {e}"))
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:8080");

        let v6 = ServerConfig {
            host: "::1".to_string(),
            port: 9000,
        };
        assert_eq!(v6.listen_addr().unwrap().to_string(), "[::1]:9000");

        let bad = ServerConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(bad.listen_addr().is_err());
    }
}

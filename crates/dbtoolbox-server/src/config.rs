use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on, e.g. "127.0.0.1" or "0.0.0.0"
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address \"{}\": {}", self.address, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_socket_addr() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "127.0.0.1:5000");

        let cfg: ServerConfig = serde_json::from_str(r#"{"address": "::1", "port": 8080}"#).unwrap();
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "[::1]:8080");

        let bad = ServerConfig {
            address: "localhost".into(),
            port: 1,
        };
        assert!(bad.socket_addr().is_err());
    }
}

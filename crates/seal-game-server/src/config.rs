//! Service configuration from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TURN_TIMEOUT_MS: u64 = 300_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Applied to rooms created without an explicit timeout
    pub default_turn_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            default_turn_timeout_ms: DEFAULT_TURN_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Read `PORT`, `BIND_ADDR` and `DEFAULT_TURN_TIMEOUT_MS`; unset or
    /// unparsable values fall back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: lookup("BIND_ADDR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bind_addr),
            port: lookup("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            default_turn_timeout_ms: lookup("DEFAULT_TURN_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_turn_timeout_ms),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

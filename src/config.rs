//! Server configuration
//!
//! Defaults match the classic relay: port 6969 on every interface,
//! 16 connection slots, 16-byte usernames, 4096-byte message buffers.

use std::env;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::RelayError;
use crate::message::CHAT_SEPARATOR;

/// Default listen address
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 6969));

/// Listen backlog
pub const DEFAULT_BACKLOG: u32 = 10;

/// Maximum simultaneously registered connections
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Maximum username length in bytes
pub const DEFAULT_USERNAME_CAPACITY: usize = 16;

/// Size of the relay buffer, `"<username>: "` prefix included
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Payloads that may wait for one slow peer; further broadcasts to it are lost
pub const DEFAULT_OUTBOUND_QUEUE: usize = 32;

/// Configuration for a chat relay server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub backlog: u32,
    pub pool_capacity: usize,
    pub username_capacity: usize,
    pub buffer_capacity: usize,
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR,
            backlog: DEFAULT_BACKLOG,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            username_capacity: DEFAULT_USERNAME_CAPACITY,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `CHAT_RELAY_*` environment variables
    ///
    /// Reads `CHAT_RELAY_ADDR`, `CHAT_RELAY_POOL_CAPACITY`,
    /// `CHAT_RELAY_USERNAME_CAPACITY`, `CHAT_RELAY_BUFFER_CAPACITY` and
    /// `CHAT_RELAY_OUTBOUND_QUEUE`.
    pub fn from_env() -> Result<Self, RelayError> {
        let mut config = Self::default();

        if let Ok(addr) = env::var("CHAT_RELAY_ADDR") {
            config.bind_addr = addr.parse()?;
        }
        if let Some(n) = env_usize("CHAT_RELAY_POOL_CAPACITY")? {
            config.pool_capacity = n;
        }
        if let Some(n) = env_usize("CHAT_RELAY_USERNAME_CAPACITY")? {
            config.username_capacity = n;
        }
        if let Some(n) = env_usize("CHAT_RELAY_BUFFER_CAPACITY")? {
            config.buffer_capacity = n;
        }
        if let Some(n) = env_usize("CHAT_RELAY_OUTBOUND_QUEUE")? {
            config.outbound_queue = n;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder-style override of the bind address
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Check that the capacities leave room for at least one message byte
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.pool_capacity == 0 {
            return Err(RelayError::Config("pool capacity must be at least 1".into()));
        }
        if self.username_capacity == 0 {
            return Err(RelayError::Config(
                "username capacity must be at least 1".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(RelayError::Config("outbound queue must be at least 1".into()));
        }
        if self.buffer_capacity <= self.max_prefix_len() {
            return Err(RelayError::Config(format!(
                "buffer capacity {} cannot hold a {}-byte prefix plus a message",
                self.buffer_capacity,
                self.max_prefix_len()
            )));
        }
        Ok(())
    }

    /// Longest possible `"<username>: "` prefix
    pub fn max_prefix_len(&self) -> usize {
        self.username_capacity + CHAT_SEPARATOR.len()
    }
}

fn env_usize(key: &str) -> Result<Option<usize>, RelayError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RelayError::Config(format!("{key} must be a number, got '{value}'"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:6969".parse::<SocketAddr>().unwrap());
        assert_eq!(config.outbound_queue, 32);
        assert_eq!(config.pool_capacity, 16);
        assert_eq!(config.username_capacity, 16);
        assert_eq!(config.buffer_capacity, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let config = ServerConfig::default().with_pool_capacity(0);
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_buffer_must_fit_prefix() {
        let config = ServerConfig {
            buffer_capacity: 18,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            buffer_capacity: 19,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_reads_outbound_queue() {
        env::set_var("CHAT_RELAY_OUTBOUND_QUEUE", "128");
        let config = ServerConfig::from_env();
        env::remove_var("CHAT_RELAY_OUTBOUND_QUEUE");

        assert_eq!(config.unwrap().outbound_queue, 128);
    }

    #[test]
    fn test_zero_outbound_queue_rejected() {
        let config = ServerConfig {
            outbound_queue: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }
}

//! Server configuration

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::signaling::DEFAULT_SIGNALING_PORT;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// How often each connection is pinged
    pub ping_interval: Duration,

    /// How long a ping may go unanswered before the connection is dropped
    pub pong_timeout: Duration,

    /// Capacity of the relay actor's command queue
    pub command_buffer: usize,

    /// How often room/connection counts are logged
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_SIGNALING_PORT)),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            command_buffer: 1024,
            stats_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the keepalive ping interval (must be non-zero)
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the relay command queue capacity (at least 1)
    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    /// Set the stats logging interval (must be non-zero)
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Reject values the server cannot run with. `SignalingServer::bind`
    /// calls this before binding.
    pub fn validate(&self) -> io::Result<()> {
        let invalid = |what: &str| {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} must be non-zero", what),
            ))
        };

        if self.command_buffer == 0 {
            return invalid("command_buffer");
        }
        if self.ping_interval.is_zero() {
            return invalid("ping_interval");
        }
        if self.pong_timeout.is_zero() {
            return invalid("pong_timeout");
        }
        if self.stats_interval.is_zero() {
            return invalid("stats_interval");
        }
        Ok(())
    }
}

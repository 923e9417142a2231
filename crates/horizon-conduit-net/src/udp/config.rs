//! Configuration types for UDP endpoint sockets.

use std::net::SocketAddr;
use std::time::Duration;

use horizon_conduit_core::DEFAULT_TICK_INTERVAL;

/// Configuration for a UDP endpoint socket.
#[derive(Clone, Debug)]
pub struct UdpSocketConfig {
    /// The address to bind to.
    pub bind_address: String,
    /// The port to bind to. Use 0 for an OS-assigned port.
    pub port: u16,
    /// Receive buffer size in bytes; bounds the largest datagram delivered.
    pub recv_buffer_size: usize,
    /// Inter-step delay of the send and receive loops.
    pub tick_interval: Duration,
}

impl Default for UdpSocketConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 0,
            recv_buffer_size: 65535,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl UdpSocketConfig {
    /// Create a new configuration that binds to the specified address and port.
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            ..Default::default()
        }
    }

    /// Create a configuration that binds to any address on the specified port.
    pub fn any_address(port: u16) -> Self {
        Self::new("0.0.0.0", port)
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the polling tick interval.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Get the bind address string (address:port).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// A received datagram with its source address.
#[derive(Clone, Debug)]
pub struct Datagram {
    /// The datagram payload.
    pub data: Vec<u8>,
    /// The source address of the datagram.
    pub source: SocketAddr,
}

impl Datagram {
    /// Create a new datagram.
    pub fn new(data: Vec<u8>, source: SocketAddr) -> Self {
        Self { data, source }
    }
}

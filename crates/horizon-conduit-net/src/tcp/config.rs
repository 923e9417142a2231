//! Configuration types for TCP clients, servers and connections.

use std::net::SocketAddr;
use std::time::Duration;

use horizon_conduit_core::DEFAULT_TICK_INTERVAL;

/// Socket-level options shared by all stream connections.
#[derive(Clone, Debug)]
pub struct TcpSocketConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Read buffer size in bytes; bounds how much one receive tick delivers.
    pub read_buffer_size: usize,
    /// Inter-step delay of the send and receive loops.
    pub tick_interval: Duration,
}

impl Default for TcpSocketConfig {
    fn default() -> Self {
        Self {
            no_delay: false,
            read_buffer_size: 8192,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl TcpSocketConfig {
    /// Create a new socket configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the polling tick interval.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// Configuration for a TCP client.
///
/// The remote endpoint is not part of the configuration; it is passed to
/// `connect` so one client can move between remotes.
#[derive(Clone, Debug, Default)]
pub struct TcpClientConfig {
    /// Local endpoint to bind outgoing sockets to. `None` lets the OS pick.
    pub local_bind: Option<SocketAddr>,
    /// Socket-level options for the established connection.
    pub socket: TcpSocketConfig,
}

impl TcpClientConfig {
    /// Create a new client configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind outgoing sockets to a specific local endpoint.
    pub fn local_bind(mut self, addr: SocketAddr) -> Self {
        self.local_bind = Some(addr);
        self
    }

    /// Set socket options.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set the polling tick interval.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.socket.tick_interval = interval;
        self
    }
}

/// Configuration for a TCP server.
#[derive(Clone, Debug)]
pub struct TcpServerConfig {
    /// The address to bind to.
    pub bind_address: String,
    /// The port to listen on. Use 0 for an OS-assigned port.
    pub port: u16,
    /// Socket-level options for accepted connections.
    pub socket: TcpSocketConfig,
}

impl TcpServerConfig {
    /// Create a new server configuration.
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            socket: TcpSocketConfig::default(),
        }
    }

    /// Set socket options for accepted connections.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY for accepted connections.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set the polling tick interval for the accept loop and accepted
    /// connections.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.socket.tick_interval = interval;
        self
    }

    /// Get the bind address string (address:port).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
